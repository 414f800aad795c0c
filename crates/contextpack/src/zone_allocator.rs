//! Zone Budget Allocator (spec §4.F, component F).

use sa_domain::arena::{Zone, ZoneBand, ZONE_ORDER};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    FloorUnmet,
}

/// Compute per-zone token caps from `total_budget`, each zone's observed
/// demand, and its configured `{min, max}` band (spec §4.F).
///
/// Zones absent from `bands` are treated as unconstrained (`min=0,
/// max=total_budget`).
pub fn allocate(
    total_budget: u32,
    zone_demands: &HashMap<Zone, u32>,
    bands: &HashMap<Zone, ZoneBand>,
) -> Result<HashMap<Zone, u32>, AllocationError> {
    let band_for = |z: Zone| -> ZoneBand {
        bands.get(&z).copied().unwrap_or(ZoneBand { min: 0, max: total_budget })
    };

    let sum_min: u64 = ZONE_ORDER.iter().map(|z| band_for(*z).min as u64).sum();
    if sum_min > total_budget as u64 {
        return Err(AllocationError::FloorUnmet);
    }

    let mut caps: HashMap<Zone, u32> = ZONE_ORDER.iter().map(|z| (*z, band_for(*z).min)).collect();
    let mut remaining = total_budget - sum_min as u32;

    loop {
        let demand_total: u64 = ZONE_ORDER
            .iter()
            .map(|z| {
                let demand = *zone_demands.get(z).unwrap_or(&0);
                let headroom = band_for(*z).max.saturating_sub(caps[z]);
                demand.min(headroom) as u64
            })
            .sum();

        if demand_total == 0 || remaining == 0 {
            break;
        }

        let mut distributed_this_round = 0u32;
        for z in ZONE_ORDER.iter() {
            let demand = *zone_demands.get(z).unwrap_or(&0);
            let headroom = band_for(*z).max.saturating_sub(caps[z]);
            let effective_demand = demand.min(headroom) as u64;
            if effective_demand == 0 {
                continue;
            }
            let share = ((remaining as u64) * effective_demand / demand_total) as u32;
            let grant = share.min(headroom);
            *caps.get_mut(z).unwrap() += grant;
            distributed_this_round += grant;
        }

        if distributed_this_round == 0 {
            // Rounding left leftover budget unassignable; grant it to the
            // first zone with remaining headroom and demand to guarantee
            // termination.
            let mut assigned = false;
            for z in ZONE_ORDER.iter() {
                let demand = *zone_demands.get(z).unwrap_or(&0);
                let headroom = band_for(*z).max.saturating_sub(caps[z]);
                if demand > 0 && headroom > 0 {
                    let grant = remaining.min(headroom);
                    *caps.get_mut(z).unwrap() += grant;
                    distributed_this_round = grant;
                    assigned = true;
                    break;
                }
            }
            if !assigned {
                break;
            }
        }

        remaining -= distributed_this_round;
    }

    Ok(caps)
}
