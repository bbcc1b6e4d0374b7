// Domain layer: models and ports shared by the client, the transfer engine and the CLI.

pub mod model;
pub mod ports;
