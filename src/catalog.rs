//! # Register Catalog
//!
//! The inverter's holding-register map, compiled in. Each entry names one
//! logical value; 32-bit entries occupy two consecutive registers and no two
//! entries overlap.
//!
//! | Range | Contents |
//! |-------|----------|
//! | 56 | operating state (u32) |
//! | 98-173 | temperatures, home consumption, AC power |
//! | 194-287 | battery, grid, DC strings |
//! | 320-327 | yields |
//! | 514 | battery SOC |
//! | 1024-1079 | battery management (some writable) |

use std::fmt;

use crate::value::Datatype;

/// Whether the device accepts writes to a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

impl Access {
    pub fn as_str(&self) -> &'static str {
        match self {
            Access::ReadOnly => "RO",
            Access::ReadWrite => "RW",
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical value in the register map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterDescriptor {
    /// Stable identifier, e.g. `minimum_soc`.
    pub name: &'static str,
    /// Human-readable label.
    pub label: &'static str,
    /// First register address.
    pub address: u16,
    pub datatype: Datatype,
    pub access: Access,
    pub unit: Option<&'static str>,
}

impl RegisterDescriptor {
    const fn ro(
        address: u16,
        name: &'static str,
        label: &'static str,
        datatype: Datatype,
        unit: Option<&'static str>,
    ) -> Self {
        Self {
            name,
            label,
            address,
            datatype,
            access: Access::ReadOnly,
            unit,
        }
    }

    const fn rw(
        address: u16,
        name: &'static str,
        label: &'static str,
        datatype: Datatype,
        unit: Option<&'static str>,
    ) -> Self {
        Self {
            access: Access::ReadWrite,
            ..Self::ro(address, name, label, datatype, unit)
        }
    }

    /// Number of registers occupied.
    #[inline]
    pub const fn width(&self) -> u16 {
        self.datatype.width() as u16
    }

    /// One past the last register address.
    #[inline]
    pub fn end(&self) -> usize {
        self.address as usize + self.datatype.width()
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.access == Access::ReadWrite
    }
}

use Datatype::{F32, I16, U16, U32};

const W: Option<&str> = Some("W");
const WH: Option<&str> = Some("Wh");
const V: Option<&str> = Some("V");
const A: Option<&str> = Some("A");
const PCT: Option<&str> = Some("%");
const DEG_C: Option<&str> = Some("°C");

/// Address of the operating-state register.
pub const INVERTER_STATE_ADDRESS: u16 = 56;

/// Address of the minimum state-of-charge setpoint.
pub const MINIMUM_SOC_ADDRESS: u16 = 1042;

#[rustfmt::skip]
static PLENTICORE_REGISTERS: &[RegisterDescriptor] = &[
    RegisterDescriptor::ro(INVERTER_STATE_ADDRESS, "inverter_state", "Inverter state", U32, None),
    RegisterDescriptor::ro(98, "controller_temperature", "Controller temperature", F32, DEG_C),
    RegisterDescriptor::ro(100, "total_dc_power", "Total DC power", F32, W),
    RegisterDescriptor::ro(106, "consumption_battery", "Home own consumption from battery", F32, W),
    RegisterDescriptor::ro(108, "consumption_grid", "Home own consumption from grid", F32, W),
    RegisterDescriptor::ro(110, "consumption_battery_total", "Total home consumption battery", F32, WH),
    RegisterDescriptor::ro(112, "consumption_grid_total", "Total home consumption grid", F32, WH),
    RegisterDescriptor::ro(114, "consumption_pv_total", "Total home consumption PV", F32, WH),
    RegisterDescriptor::ro(116, "consumption_pv", "Home own consumption from PV", F32, W),
    RegisterDescriptor::ro(118, "consumption_total", "Total home consumption", F32, WH),
    RegisterDescriptor::ro(144, "worktime", "Worktime", F32, Some("s")),
    RegisterDescriptor::ro(156, "power_ac_total", "Power AC total", F32, W),
    RegisterDescriptor::ro(162, "power_ac_phase_1", "Power AC phase 1", F32, W),
    RegisterDescriptor::ro(168, "power_ac_phase_2", "Power AC phase 2", F32, W),
    RegisterDescriptor::ro(172, "power_ac_phase_3", "Power AC phase 3", F32, W),
    RegisterDescriptor::ro(194, "number_battery_cycles", "Number of battery cycles", F32, None),
    RegisterDescriptor::ro(200, "battery_voltage", "Battery voltage", F32, V),
    RegisterDescriptor::ro(210, "act_state_of_charge", "Act. state of charge", U16, PCT),
    RegisterDescriptor::ro(214, "battery_temperature", "Battery temperature", F32, DEG_C),
    RegisterDescriptor::ro(216, "battery_diagnose_current", "Battery diagnose current", F32, A),
    RegisterDescriptor::ro(224, "house_consumption", "House consumption", F32, W),
    RegisterDescriptor::ro(234, "power_from_grid", "Power from grid", F32, W),
    RegisterDescriptor::ro(244, "power_to_grid", "Power to grid", F32, W),
    RegisterDescriptor::ro(252, "power_to_battery", "Power to battery", F32, W),
    RegisterDescriptor::ro(258, "current_dc1", "Current DC1", F32, A),
    RegisterDescriptor::ro(260, "power_dc1", "Power DC1", F32, W),
    RegisterDescriptor::ro(266, "voltage_dc1", "Voltage DC1", F32, V),
    RegisterDescriptor::ro(268, "current_dc2", "Current DC2", F32, A),
    RegisterDescriptor::ro(270, "power_dc2", "Power DC2", F32, W),
    RegisterDescriptor::ro(276, "voltage_dc2", "Voltage DC2", F32, V),
    RegisterDescriptor::ro(278, "current_dc3", "Current DC3", F32, A),
    RegisterDescriptor::ro(280, "power_dc3", "Power DC3", F32, W),
    RegisterDescriptor::ro(286, "voltage_dc3", "Voltage DC3", F32, V),
    RegisterDescriptor::ro(320, "total_yield", "Total yield", F32, WH),
    RegisterDescriptor::ro(322, "total_yield_dc", "Total yield DC", F32, WH),
    RegisterDescriptor::ro(324, "total_yield_ac", "Total yield AC", F32, WH),
    RegisterDescriptor::ro(326, "total_yield_battery", "Total yield battery", F32, WH),
    RegisterDescriptor::ro(514, "battery_actual_soc", "Battery actual SOC", U16, PCT),
    RegisterDescriptor::rw(1024, "battery_charge_power_ac_setpoint", "Battery charge power (AC) setpoint", I16, W),
    RegisterDescriptor::ro(1025, "power_scale_factor", "Power scale factor", I16, None),
    RegisterDescriptor::rw(MINIMUM_SOC_ADDRESS, "minimum_soc", "Minimum SOC", F32, PCT),
    RegisterDescriptor::rw(1044, "maximum_soc", "Maximum SOC", F32, PCT),
    RegisterDescriptor::ro(1046, "battery_actual_charge_power", "Battery actual charge power", F32, W),
    RegisterDescriptor::ro(1048, "battery_actual_discharge_power", "Battery actual discharge power", F32, W),
    RegisterDescriptor::ro(1050, "battery_charge_total", "Battery charge total", F32, WH),
    RegisterDescriptor::ro(1052, "battery_discharge_total", "Battery discharge total", F32, WH),
    RegisterDescriptor::ro(1054, "total_dc_energy_from_pv1", "Total DC energy from PV1", F32, WH),
    RegisterDescriptor::ro(1056, "total_dc_energy_from_pv2", "Total DC energy from PV2", F32, WH),
    RegisterDescriptor::ro(1058, "total_energy_ac_side_from_grid", "Total energy AC-side from grid", F32, WH),
    RegisterDescriptor::ro(1060, "total_energy_ac_side_to_house", "Total energy AC-side to house", F32, WH),
    RegisterDescriptor::ro(1062, "total_dc_energy_from_pv3", "Total DC energy from PV3", F32, WH),
    RegisterDescriptor::ro(1064, "total_energy_ac_side_to_grid", "Total energy AC-side to grid", F32, WH),
    RegisterDescriptor::ro(1066, "total_dc_power_sum_of_all_pv_inputs", "Total DC power (sum of all PV inputs)", F32, W),
    RegisterDescriptor::ro(1068, "battery_work_capacity", "Battery work capacity", F32, WH),
    RegisterDescriptor::ro(1076, "max_charge_power", "Maximum charge power", F32, W),
    RegisterDescriptor::ro(1078, "max_discharge_power", "Maximum discharge power", F32, W),
];

/// Lookup over a static descriptor table.
#[derive(Debug, Clone, Copy)]
pub struct RegisterCatalog {
    registers: &'static [RegisterDescriptor],
}

impl RegisterCatalog {
    /// The KOSTAL Plenticore register map.
    pub fn plenticore() -> Self {
        Self {
            registers: PLENTICORE_REGISTERS,
        }
    }

    /// A catalog over a custom table (tests, other firmware variants).
    pub fn from_static(registers: &'static [RegisterDescriptor]) -> Self {
        Self { registers }
    }

    /// Lookup by logical name.
    pub fn describe(&self, name: &str) -> Option<&'static RegisterDescriptor> {
        self.registers.iter().find(|d| d.name == name)
    }

    /// All descriptors in declaration order.
    pub fn all(&self) -> &'static [RegisterDescriptor] {
        self.registers
    }

    pub fn at_address(&self, address: u16) -> Option<&'static RegisterDescriptor> {
        self.registers.iter().find(|d| d.address == address)
    }

    pub fn writable(&self) -> impl Iterator<Item = &'static RegisterDescriptor> {
        self.registers.iter().filter(|d| d.is_writable())
    }

    /// The operating-state descriptor, if the table has one.
    pub fn inverter_state(&self) -> Option<&'static RegisterDescriptor> {
        self.at_address(INVERTER_STATE_ADDRESS)
            .filter(|d| d.datatype == Datatype::U32)
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }
}

impl Default for RegisterCatalog {
    fn default() -> Self {
        Self::plenticore()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_describe() {
        let catalog = RegisterCatalog::plenticore();
        let min_soc = catalog.describe("minimum_soc").unwrap();
        assert_eq!(min_soc.address, 1042);
        assert_eq!(min_soc.datatype, Datatype::F32);
        assert_eq!(min_soc.width(), 2);
        assert!(min_soc.is_writable());
        assert_eq!(min_soc.unit, Some("%"));

        assert!(catalog.describe("no_such_register").is_none());
    }

    #[test]
    fn test_at_address() {
        let catalog = RegisterCatalog::plenticore();
        assert_eq!(catalog.at_address(210).unwrap().name, "act_state_of_charge");
        assert!(catalog.at_address(211).is_none());
    }

    #[test]
    fn test_inverter_state_descriptor() {
        let state = RegisterCatalog::plenticore().inverter_state().unwrap();
        assert_eq!(state.address, 56);
        assert_eq!(state.datatype, Datatype::U32);
    }

    #[test]
    fn test_writable() {
        let names: Vec<_> = RegisterCatalog::plenticore()
            .writable()
            .map(|d| d.name)
            .collect();
        assert_eq!(
            names,
            vec!["battery_charge_power_ac_setpoint", "minimum_soc", "maximum_soc"]
        );
    }

    #[test]
    fn test_names_unique() {
        let catalog = RegisterCatalog::plenticore();
        let names: HashSet<_> = catalog.all().iter().map(|d| d.name).collect();
        assert_eq!(names.len(), catalog.len());
    }

    #[test]
    fn test_no_overlapping_words() {
        let mut spans: Vec<_> = RegisterCatalog::plenticore()
            .all()
            .iter()
            .map(|d| (d.address as usize, d.end()))
            .collect();
        spans.sort();
        for pair in spans.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "{:?} overlaps {:?}", pair[0], pair[1]);
        }
    }
}
