pub mod commands;

use clap::ValueEnum;

#[derive(ValueEnum, Clone, Debug, Copy)]
pub enum CliToggle {
    On,
    Off,
}

impl CliToggle {
    pub fn enabled(self) -> bool {
        matches!(self, CliToggle::On)
    }
}
