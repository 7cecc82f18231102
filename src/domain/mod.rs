// Domain layer: data model and the capability ports the pipeline is built on.

pub mod model;
pub mod ports;
