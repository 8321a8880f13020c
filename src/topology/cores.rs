//! Core generation and allocation-state reconciliation.

use anyhow::{ensure, Result};

use crate::models::CoreStatus;

/// Standard 12-color fiber sequence, used for both tubes and cores
pub const FIBER_COLORS: [&str; 12] = [
    "Blue", "Orange", "Green", "Brown", "Slate", "White",
    "Red", "Black", "Yellow", "Violet", "Rose", "Aqua",
];

/// A core row to be inserted alongside its cable
#[derive(Debug, Clone, PartialEq)]
pub struct NewCore {
    pub cable_id: i64,
    pub core_index: i32,
    pub tube_color: &'static str,
    pub core_color: &'static str,
    pub status: CoreStatus,
}

/// Palette indices (tube, core) for a 1-based core index
pub fn palette_position(core_index: i32) -> (usize, usize) {
    let zero_based = (core_index - 1).max(0) as usize;
    let per_tube = FIBER_COLORS.len();
    ((zero_based / per_tube) % per_tube, zero_based % per_tube)
}

/// Generate the full ordered core set for a cable: indices 1..=count, all vacant
pub fn generate_cores(cable_id: i64, count: i32) -> Result<Vec<NewCore>> {
    ensure!(count >= 1, "core count must be at least 1 (got {})", count);

    Ok((1..=count)
        .map(|core_index| {
            let (tube, core) = palette_position(core_index);
            NewCore {
                cable_id,
                core_index,
                tube_color: FIBER_COLORS[tube],
                core_color: FIBER_COLORS[core],
                status: CoreStatus::Vacant,
            }
        })
        .collect())
}

/// Direction of a connection change that touches a core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationChange {
    /// A connection referencing the core was created
    Attach,
    /// A connection referencing the core was removed
    Detach,
}

/// Next state for a core after a connection change, or `None` to leave it.
///
/// `still_referenced` is whether another live connection keeps using the
/// core after a detach. Manual RESERVED/DAMAGED overrides survive detach,
/// and a DAMAGED core is never promoted to USED.
pub fn reconcile(current: CoreStatus, change: AllocationChange, still_referenced: bool) -> Option<CoreStatus> {
    match (change, current) {
        (AllocationChange::Attach, CoreStatus::Vacant | CoreStatus::Reserved) => Some(CoreStatus::Used),
        (AllocationChange::Attach, CoreStatus::Used | CoreStatus::Damaged) => None,
        (AllocationChange::Detach, CoreStatus::Used) if !still_referenced => Some(CoreStatus::Vacant),
        (AllocationChange::Detach, _) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generates_exact_count_without_gaps() {
        for count in [1, 12, 13, 24, 96, 288] {
            let cores = generate_cores(42, count).unwrap();
            assert_eq!(cores.len(), count as usize);
            for (i, core) in cores.iter().enumerate() {
                assert_eq!(core.core_index, i as i32 + 1);
                assert_eq!(core.cable_id, 42);
                assert_eq!(core.status, CoreStatus::Vacant);
            }
        }
    }

    #[test]
    fn test_rejects_non_positive_count() {
        assert!(generate_cores(1, 0).is_err());
        assert!(generate_cores(1, -4).is_err());
    }

    #[test]
    fn test_palette_cycle() {
        let cores = generate_cores(1, 26).unwrap();
        assert_eq!((cores[0].tube_color, cores[0].core_color), ("Blue", "Blue"));
        assert_eq!((cores[11].tube_color, cores[11].core_color), ("Blue", "Aqua"));
        // core 13 starts the second tube
        assert_eq!(palette_position(13), (1, 0));
        assert_eq!((cores[12].tube_color, cores[12].core_color), ("Orange", "Blue"));
        assert_eq!((cores[25].tube_color, cores[25].core_color), ("Green", "Orange"));
    }

    #[test]
    fn test_tube_palette_wraps_after_144_cores() {
        assert_eq!(palette_position(144), (11, 11));
        assert_eq!(palette_position(145), (0, 0));
        let cores = generate_cores(1, 288).unwrap();
        assert_eq!(cores[144].tube_color, "Blue");
        assert_eq!(cores[287].tube_color, "Aqua");
    }

    #[test]
    fn test_generation_is_deterministic() {
        assert_eq!(generate_cores(3, 48).unwrap(), generate_cores(3, 48).unwrap());
    }

    #[test]
    fn test_reconcile_attach() {
        use AllocationChange::Attach;
        assert_eq!(reconcile(CoreStatus::Vacant, Attach, false), Some(CoreStatus::Used));
        assert_eq!(reconcile(CoreStatus::Reserved, Attach, false), Some(CoreStatus::Used));
        assert_eq!(reconcile(CoreStatus::Used, Attach, true), None);
        assert_eq!(reconcile(CoreStatus::Damaged, Attach, false), None);
    }

    #[test]
    fn test_reconcile_detach() {
        use AllocationChange::Detach;
        assert_eq!(reconcile(CoreStatus::Used, Detach, false), Some(CoreStatus::Vacant));
        assert_eq!(reconcile(CoreStatus::Used, Detach, true), None);
        assert_eq!(reconcile(CoreStatus::Reserved, Detach, false), None);
        assert_eq!(reconcile(CoreStatus::Damaged, Detach, false), None);
        assert_eq!(reconcile(CoreStatus::Vacant, Detach, false), None);
    }
}
