//! Compound cell identifier decoding
//!
//! Each radio technology packs a macro base station id and a sector id into
//! a single integer. Decoding is pure bit/decimal arithmetic; callers are
//! responsible for checking that the identifier fits the technology's
//! declared bit width, the decoder only rejects domain violations it cannot
//! compute over.

use crate::error::{CellmonError, Result};
use crate::types::{DecodedIdentifier, Technology};

/// Default NR sector-id width; operators commonly configure 4-14 bits
pub const NR_DEFAULT_SECTOR_BITS: u8 = 4;

/// Decode a compound cell identifier for the given technology.
///
/// `nr_sector_bits` is only consulted for NR; `None` selects
/// [`NR_DEFAULT_SECTOR_BITS`]. GSM splits in base 10, everything else on a
/// power-of-two boundary:
///
/// - GSM: station = id / 10, sector = id % 10
/// - UMTS (28-bit LCID): RNC = id >> 16, CID = id & 0xFFFF
/// - LTE (28-bit ECI): eNodeB = id >> 8, sector = id & 0xFF
/// - NR (36-bit NCI): gNodeB = id >> w, sector = id & ((1 << w) - 1)
pub fn decode(tech: Technology, id: i64, nr_sector_bits: Option<u8>) -> Result<DecodedIdentifier> {
    if id < 0 {
        return Err(CellmonError::DecodeDomain(format!(
            "negative {} cell identifier: {}",
            tech, id
        )));
    }

    match tech {
        Technology::Gsm => Ok(DecodedIdentifier {
            station: id / 10,
            sector: id % 10,
        }),
        Technology::Umts => Ok(DecodedIdentifier {
            station: id >> 16,
            sector: id & 0xFFFF,
        }),
        Technology::Lte => Ok(DecodedIdentifier {
            station: id >> 8,
            sector: id & 0xFF,
        }),
        Technology::Nr => {
            let bits = nr_sector_bits.unwrap_or(NR_DEFAULT_SECTOR_BITS);
            if !(4..=14).contains(&bits) {
                return Err(CellmonError::DecodeDomain(format!(
                    "NR sector width {} outside 4-14",
                    bits
                )));
            }
            Ok(DecodedIdentifier {
                station: id >> bits,
                sector: id & ((1 << bits) - 1),
            })
        }
        // SCDMA and CDMA identifiers carry no documented sector split;
        // treat the whole id as the station.
        Technology::Scdma | Technology::Cdma => Ok(DecodedIdentifier {
            station: id,
            sector: 0,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gsm_decimal_split() {
        for id in [0i64, 9, 10, 1234567, 99999999] {
            let d = decode(Technology::Gsm, id, None).unwrap();
            assert_eq!(d.station, id / 10);
            assert_eq!(d.sector, id % 10);
            assert_eq!(d.station * 10 + d.sector, id);
        }
    }

    #[test]
    fn test_umts_lcid_split() {
        let d = decode(Technology::Umts, (0x1ABC << 16) | 0x00FF, None).unwrap();
        assert_eq!(d.station, 0x1ABC);
        assert_eq!(d.sector, 0x00FF);
    }

    #[test]
    fn test_lte_eci_split() {
        let d = decode(Technology::Lte, 1234567, None).unwrap();
        assert_eq!(d.station, 4822);
        assert_eq!(d.sector, 119);
        // recomposition over the full 28-bit space edge
        for id in [0i64, 255, 256, (1 << 28) - 1] {
            let d = decode(Technology::Lte, id, None).unwrap();
            assert_eq!(d.station * 256 + d.sector, id);
        }
    }

    #[test]
    fn test_nr_parameterized_width() {
        let id: i64 = (1 << 36) - 1;
        for w in 4u8..=14 {
            let d = decode(Technology::Nr, id, Some(w)).unwrap();
            assert_eq!(d.station * (1 << w) + d.sector, id);
            assert!(d.sector < (1 << w));
        }
    }

    #[test]
    fn test_nr_width_out_of_range() {
        assert!(decode(Technology::Nr, 42, Some(3)).is_err());
        assert!(decode(Technology::Nr, 42, Some(15)).is_err());
    }

    #[test]
    fn test_negative_rejected() {
        for tech in [Technology::Gsm, Technology::Umts, Technology::Lte, Technology::Nr] {
            assert!(decode(tech, -1, None).is_err());
        }
    }
}
