use reqdraft_api::ApiClient;
use reqdraft_core::config::{AppConfig, LoadOptions};
use reqdraft_core::NumberingReservation;

use super::CommandResult;

const COMMAND: &str = "reserve";

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), 2);
        }
    };
    let client = match ApiClient::new(&config.api) {
        Ok(client) => client,
        Err(error) => return CommandResult::failure(COMMAND, "client_build", error.to_string(), 1),
    };
    let runtime = match super::command_runtime() {
        Ok(runtime) => runtime,
        Err(error) => return CommandResult::failure(COMMAND, "runtime", error.to_string(), 1),
    };

    match runtime.block_on(NumberingReservation::reserve(&client)) {
        Ok(number) => CommandResult::success(
            COMMAND,
            format!("next draft would display requisition number {number} (soft reservation)"),
        ),
        Err(error) => CommandResult::failure(COMMAND, "reservation_failed", error.to_string(), 1),
    }
}
