//! Moonraker response payloads.

use serde::Deserialize;

use crate::domain::MachineState;
use crate::domain::ports::MachineSnapshot;

/// `GET /printer/objects/query?print_stats` envelope.
#[derive(Debug, Deserialize)]
pub(super) struct QueryResponseDto {
    result: QueryResultDto,
}

#[derive(Debug, Deserialize)]
struct QueryResultDto {
    status: QueryStatusDto,
}

#[derive(Debug, Deserialize)]
struct QueryStatusDto {
    print_stats: PrintStatsDto,
}

#[derive(Debug, Deserialize)]
struct PrintStatsDto {
    state: String,
    #[serde(default)]
    filename: Option<String>,
}

impl QueryResponseDto {
    pub(super) fn into_snapshot(self) -> Result<MachineSnapshot, String> {
        let stats = self.result.status.print_stats;
        let state = map_print_state(&stats.state)?;
        let active_file = stats
            .filename
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty());
        Ok(MachineSnapshot { state, active_file })
    }
}

fn map_print_state(raw: &str) -> Result<MachineState, String> {
    match raw {
        "standby" => Ok(MachineState::Idle),
        "printing" => Ok(MachineState::Printing),
        "paused" => Ok(MachineState::Paused),
        "complete" => Ok(MachineState::Finished),
        "cancelled" => Ok(MachineState::Cancelled),
        "error" => Ok(MachineState::Error),
        other => Err(format!("unknown print_stats state '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn decode(state: &str, filename: &str) -> Result<MachineSnapshot, String> {
        let body = format!(
            r#"{{"result":{{"eventtime":1.5,"status":{{"print_stats":{{"state":"{state}","filename":"{filename}"}}}}}}}}"#
        );
        serde_json::from_str::<QueryResponseDto>(&body)
            .map_err(|err| err.to_string())?
            .into_snapshot()
    }

    #[rstest]
    #[case("standby", MachineState::Idle)]
    #[case("printing", MachineState::Printing)]
    #[case("paused", MachineState::Paused)]
    #[case("complete", MachineState::Finished)]
    #[case("cancelled", MachineState::Cancelled)]
    #[case("error", MachineState::Error)]
    fn maps_print_states(#[case] raw: &str, #[case] expected: MachineState) {
        assert_eq!(decode(raw, "").map(|s| s.state), Ok(expected));
    }

    #[rstest]
    fn blank_filename_is_absent() {
        assert_eq!(decode("standby", " ").map(|s| s.active_file), Ok(None));
    }

    #[rstest]
    fn keeps_nested_filenames() {
        assert_eq!(
            decode("printing", "parts/bracket.gcode").map(|s| s.active_file),
            Ok(Some("parts/bracket.gcode".to_owned()))
        );
    }

    #[rstest]
    fn rejects_unknown_states() {
        assert!(decode("warming", "").is_err());
    }
}
