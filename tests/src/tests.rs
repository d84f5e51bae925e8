#![cfg(test)]

mod script;
mod snapshot;
mod soc;
mod timer;
mod uart;
