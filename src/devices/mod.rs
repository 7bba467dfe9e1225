
// Currently the only supported family is the Hantek DSO2000 series (DSO2C10, DSO2D10, DSO2D15, ...).  Other models
// that share the ":WAV:DATA:ALL?" block format would go in here next to it

pub mod dso2000;
