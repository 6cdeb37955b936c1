use nvmprog_target::FlashRegion;
use std::ops::Range;

/// A span of target memory an operation should act on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemorySpan {
    /// Address of the first byte.
    pub address: u64,
    /// Length in bytes.
    pub size: u64,
}

impl MemorySpan {
    /// Creates a span of `size` bytes starting at `address`.
    pub fn new(address: u64, size: u64) -> Self {
        Self { address, size }
    }

    /// Returns the address range of the span.
    pub fn range(&self) -> Range<u64> {
        self.address..self.address.saturating_add(self.size)
    }
}

impl std::fmt::Display for MemorySpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:#010x}..{:#010x}",
            self.address,
            self.address.saturating_add(self.size)
        )
    }
}

/// The reason a span is not a legal flash write target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, docsplay::Display)]
pub enum RegionViolation {
    /// memory region is not 32-bit aligned
    NotAligned {
        /// The offending start address.
        address: u64,
    },
    /// memory region is not a multiple of 32-bits
    NotWordMultiple {
        /// The offending size.
        size: u64,
    },
    /// memory region is not within flash
    NotWithinFlash {
        /// Start of the span.
        start: u64,
        /// End of the span (exclusive).
        end: u64,
    },
}

/// Checks whether `span` can be written to the flash described by `regions`.
///
/// The rules are applied in order, the first one which fails is reported:
/// word aligned start, whole number of words, fully inside a single region.
pub(crate) fn check_region(
    regions: &[FlashRegion],
    span: &MemorySpan,
) -> Result<(), RegionViolation> {
    if span.address % 4 != 0 {
        return Err(RegionViolation::NotAligned {
            address: span.address,
        });
    }

    if span.size % 4 != 0 {
        return Err(RegionViolation::NotWordMultiple { size: span.size });
    }

    let range = span.range();
    if regions.iter().any(|region| region.contains_range(&range)) {
        Ok(())
    } else {
        Err(RegionViolation::NotWithinFlash {
            start: range.start,
            end: range.end,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nvmprog_target::RegionKind;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn regions() -> Vec<FlashRegion> {
        vec![
            FlashRegion {
                name: "flash1".to_string(),
                kind: RegionKind::Code,
                base_address: 0x0800_0000,
                size: 0x4000,
            },
            // Directly adjacent, so a span can straddle both.
            FlashRegion {
                name: "UICR".to_string(),
                kind: RegionKind::Config,
                base_address: 0x0800_4000,
                size: 0x400,
            },
        ]
    }

    #[test_case(0x0800_0000, 0x4000; "whole code region")]
    #[test_case(0x0800_0100, 0x100; "inside code region")]
    #[test_case(0x0800_3ffc, 4; "last word")]
    #[test_case(0x0800_4000, 0x400; "whole config region")]
    fn accepted(address: u64, size: u64) {
        assert_eq!(check_region(&regions(), &MemorySpan::new(address, size)), Ok(()));
    }

    #[test]
    fn misaligned_address_is_reported_first() {
        let result = check_region(&regions(), &MemorySpan::new(0x0800_0002, 0x100));

        assert_eq!(
            result,
            Err(RegionViolation::NotAligned {
                address: 0x0800_0002
            })
        );
        assert_eq!(
            result.unwrap_err().to_string(),
            "memory region is not 32-bit aligned"
        );
    }

    #[test]
    fn misaligned_size_outside_flash_reports_size() {
        let result = check_region(&regions(), &MemorySpan::new(0x2000_0000, 0x101));

        assert_eq!(result, Err(RegionViolation::NotWordMultiple { size: 0x101 }));
        assert_eq!(
            result.unwrap_err().to_string(),
            "memory region is not a multiple of 32-bits"
        );
    }

    #[test]
    fn span_past_region_end() {
        let regions = &regions()[..1];
        let result = check_region(regions, &MemorySpan::new(0x0800_3f00, 0x200));

        assert_eq!(
            result,
            Err(RegionViolation::NotWithinFlash {
                start: 0x0800_3f00,
                end: 0x0800_4100,
            })
        );
        assert_eq!(
            result.unwrap_err().to_string(),
            "memory region is not within flash"
        );
    }

    #[test_case(0x0800_3f00, 0x200; "straddles two regions")]
    #[test_case(0x07ff_fffc, 8; "starts before flash")]
    #[test_case(0x2000_0000, 4; "outside all regions")]
    #[test_case(0x0800_0000, 0; "empty span")]
    fn rejected(address: u64, size: u64) {
        assert!(matches!(
            check_region(&regions(), &MemorySpan::new(address, size)),
            Err(RegionViolation::NotWithinFlash { .. })
        ));
    }

    #[test]
    fn overflowing_span_is_rejected() {
        assert!(matches!(
            check_region(&regions(), &MemorySpan::new(0xffff_ffff_ffff_fffc, 8)),
            Err(RegionViolation::NotWithinFlash { .. })
        ));
    }
}
