/// Reduced Planck constant (J s)
pub const HBAR: f64 = 1.05457180013e-34;

/// Mass of a rubidium-87 atom (kg)
pub const RB87_MASS: f64 = 1.4431607e-25;

/// s-wave scattering length of rubidium-87 (m)
pub const RB87_SCATTERING_LENGTH: f64 = 4.67e-9;

/// Default harmonic trapping frequency (rad/s) along every axis
pub const DEFAULT_TRAP_FREQUENCY: f64 = 6.283;
