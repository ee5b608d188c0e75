//! Small numeric helpers shared by indicators and detectors.

pub mod math;
