use crate::image::Block;
use crate::teensy41;

pub type Report = [u8; teensy41::PACKET_SIZE];

/// Encodes the low 24 bits of `addr` into the report header.
fn write_addr(pkt: &mut Report, addr: u32) {
    pkt[0] = (addr & 0xFF) as u8;
    pkt[1] = ((addr >> 8) & 0xFF) as u8;
    pkt[2] = ((addr >> 16) & 0xFF) as u8;
}

/// Write report for one block. A short block is padded with erased-flash bytes.
pub fn block_report(block: &Block<'_>) -> Report {
    let mut pkt = [0u8; teensy41::PACKET_SIZE];
    write_addr(&mut pkt, block.addr as u32);

    let payload = &mut pkt[teensy41::HEADER_SIZE..];
    payload[..block.data.len()].copy_from_slice(block.data);
    for b in &mut payload[block.data.len()..] {
        *b = 0xFF;
    }
    pkt
}

/// Tells HalfKay to leave programming mode and run the new firmware.
pub fn reboot_report() -> Report {
    let mut pkt = [0u8; teensy41::PACKET_SIZE];
    write_addr(&mut pkt, 0xFF_FFFF);
    pkt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_carries_little_endian_24_bit_address() {
        for addr in [0usize, 0x400, 0x1_2C00, 0x7B_FC00, 0xFF_FC00] {
            let data = [0x5Au8; 16];
            let pkt = block_report(&Block { addr, data: &data });
            assert_eq!(pkt[0], (addr & 0xFF) as u8);
            assert_eq!(pkt[1], ((addr >> 8) & 0xFF) as u8);
            assert_eq!(pkt[2], ((addr >> 16) & 0xFF) as u8);
            assert!(pkt[3..teensy41::HEADER_SIZE].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn short_block_is_padded_with_ff() {
        let data = vec![0x11u8; 476];
        let pkt = block_report(&Block {
            addr: 1024,
            data: &data,
        });
        let payload = &pkt[teensy41::HEADER_SIZE..];
        assert_eq!(payload.len(), teensy41::BLOCK_SIZE);
        assert!(payload[..476].iter().all(|&b| b == 0x11));
        assert!(payload[476..].iter().all(|&b| b == 0xFF));
        assert_eq!(payload[476..].len(), 548);
    }

    #[test]
    fn reboot_report_layout() {
        let pkt = reboot_report();
        assert_eq!(&pkt[..3], &[0xFF, 0xFF, 0xFF]);
        assert!(pkt[3..].iter().all(|&b| b == 0));
    }
}
