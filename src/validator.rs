use crate::checksum::V2SumState;
use crate::demo_parser::ParseResult;
use crate::report_output::{ReportLine, ReportOutput};
use crate::sar_data::{SarData, Timestamp};
use crate::utils::{format_ticks, ticks_to_seconds};
use crate::whitelist::{Whitelist, is_file_ignored};

use log::trace;

/// Walks a parsed demo and reports everything worth a human's attention.
///
/// Malformed records only ever produce an `(INVALID)` line; validation itself cannot fail.
#[derive(Debug)]
pub struct Validator<'w> {
    whitelist: &'w Whitelist,
    timescale_changes: usize,
}

impl<'w> Validator<'w> {
    pub fn new(whitelist: &'w Whitelist) -> Self {
        Validator {
            whitelist,
            timescale_changes: 0,
        }
    }

    /// Timescale changes seen so far, across every validated demo.
    pub fn timescale_changes(&self) -> usize {
        self.timescale_changes
    }

    pub fn validate<O: ReportOutput + ?Sized>(&mut self, result: &ParseResult<'_>, output: &mut O) {
        self.report_checksum(result, output);

        for command in result.demo.console_commands() {
            output.emit(ReportLine::checked(
                "Command",
                command,
                self.whitelist.is_command_allowed(command),
            ));
        }

        for data in &result.messages {
            trace!("Validating {:?}", data.data_type());
            self.report_sar_data(data, output);
        }
    }

    fn report_checksum<O: ReportOutput + ?Sized>(&self, result: &ParseResult<'_>, output: &mut O) {
        // v2 checksums are looked up in the same set as legacy ones.
        let line = match result.checksum {
            Some(checksum) => ReportLine::checked(
                "Checksum",
                format!("{checksum:08X}"),
                self.whitelist.is_checksum_allowed(checksum),
            ),
            None => ReportLine::checked("Checksum", "no checksum", false),
        };
        output.emit(line);

        match result.v2sum_state {
            V2SumState::None => {}
            V2SumState::Valid => output.emit(ReportLine::new("Signature", "valid")),
            V2SumState::Invalid => output.emit(ReportLine::checked("Signature", "invalid", false)),
        }
    }

    fn report_sar_data<O: ReportOutput + ?Sized>(&mut self, data: &SarData, output: &mut O) {
        match data {
            SarData::TimescaleCheat { timescale } => {
                self.timescale_changes += 1;
                output.emit(ReportLine::new("Timescale", timescale.to_string()));
            }
            SarData::InitialCvar { cvar, val } => {
                output.emit(ReportLine::checked(
                    "Cvar",
                    format!("{cvar} {val}"),
                    self.whitelist.is_cvar_allowed(cvar, val),
                ));
            }
            SarData::Pause { pause_ticks } => {
                output.emit(ReportLine::new(
                    "Pause",
                    format!(
                        "{pause_ticks} ticks ({:.3}s)",
                        ticks_to_seconds(u64::from(*pause_ticks))
                    ),
                ));
            }
            SarData::Invalid => {
                output.emit(ReportLine::checked("Invalid", "corrupted data", false));
            }
            SarData::WaitRun { tick, cmd } => {
                output.emit(ReportLine::new("Wait", format!("tick {tick}: {cmd}")));
            }
            SarData::HwaitRun { ticks, cmd } => {
                output.emit(ReportLine::new("Hwait", format!("{ticks} ticks: {cmd}")));
            }
            SarData::SpeedrunTime { splits } => {
                output.emit(ReportLine::new("Speedrun", format!("{} splits", splits.len())));
                for split in splits {
                    for seg in &split.segs {
                        output.emit(ReportLine::new(
                            "Segment",
                            format!("{}/{}: {} ticks", split.name, seg.name, seg.ticks),
                        ));
                    }
                    let ticks = split.ticks();
                    output.emit(ReportLine::new(
                        "Total",
                        format!("{}: {} ({ticks} ticks)", split.name, format_ticks(ticks)),
                    ));
                }
            }
            SarData::Timestamp(timestamp) => {
                output.emit(ReportLine::new("Recorded", format_timestamp(timestamp)));
            }
            SarData::FileChecksum { sum, path } => {
                if is_file_ignored(path) {
                    return;
                }
                output.emit(ReportLine::checked(
                    "File",
                    format!("{path} {sum:08X}"),
                    self.whitelist.is_file_allowed(path, *sum),
                ));
            }
            SarData::EntityInput(_)
            | SarData::EntityInputSlot { .. }
            | SarData::PortalPlacement { .. }
            | SarData::ChallengeFlags { .. }
            | SarData::CrouchFly { .. }
            | SarData::Checksum { .. }
            | SarData::ChecksumV2 { .. } => {}
        }
    }
}

/// Validate `result` against `whitelist`, sending report lines to `output`.
pub fn validate<O: ReportOutput + ?Sized>(
    result: &ParseResult<'_>,
    whitelist: &Whitelist,
    output: &mut O,
) {
    Validator::new(whitelist).validate(result, output);
}

fn format_timestamp(t: &Timestamp) -> String {
    format!(
        "{:04}/{:02}/{:02} {:02}:{:02}:{:02} UTC",
        t.year, t.mon, t.day, t.hour, t.min, t.sec
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo_header::DemoHeader;
    use crate::demo_message::{DemoMessage, MessageBody};
    use crate::demo_parser::Demo;
    use crate::sar_data::{SpeedrunSegment, SpeedrunSplit};
    use pretty_assertions::assert_eq;

    fn header() -> DemoHeader {
        DemoHeader {
            demo_protocol: 4,
            network_protocol: 2001,
            server_name: String::new(),
            client_name: String::new(),
            map_name: "sp_a1_intro1".to_owned(),
            game_directory: "portal2".to_owned(),
            playback_time: 0.0,
            playback_ticks: 0,
            playback_frames: 0,
            signon_length: 0,
        }
    }

    fn result_with(commands: &[&str], messages: Vec<SarData>) -> ParseResult<'static> {
        let mut demo_messages: Vec<DemoMessage<'static>> = commands
            .iter()
            .map(|command| DemoMessage {
                tick: 0,
                slot: Some(0),
                body: MessageBody::ConsoleCmd((*command).to_owned()),
            })
            .collect();
        demo_messages.push(DemoMessage {
            tick: 0,
            slot: Some(0),
            body: MessageBody::Stop { trailing: &[] },
        });

        ParseResult {
            demo: Demo {
                header: header(),
                messages: demo_messages,
            },
            messages,
            checksum: None,
            v2sum_state: V2SumState::None,
        }
    }

    fn report(result: &ParseResult<'_>, whitelist: &Whitelist) -> Vec<String> {
        let mut lines: Vec<ReportLine> = Vec::new();
        validate(result, whitelist, &mut lines);
        lines.iter().map(ReportLine::to_string).collect()
    }

    /// Everything after the checksum line.
    fn report_tail(result: &ParseResult<'_>, whitelist: &Whitelist) -> Vec<String> {
        report(result, whitelist).split_off(1)
    }

    #[test]
    fn test_reports_missing_checksum() {
        let result = result_with(&[], vec![]);
        assert_eq!(
            report(&result, &Whitelist::new()),
            vec!["Checksum: no checksum (INVALID)"]
        );
    }

    #[test]
    fn test_reports_checksum_membership() {
        let whitelist = Whitelist::from_sources("DEADBEEF\n", "", "", "");
        let mut result = result_with(&[], vec![]);

        result.checksum = Some(0xDEAD_BEEF);
        assert_eq!(report(&result, &whitelist), vec!["Checksum: DEADBEEF"]);

        result.checksum = Some(0xAB);
        assert_eq!(report(&result, &whitelist), vec!["Checksum: 000000AB (INVALID)"]);
    }

    #[test]
    fn test_v2_checksum_uses_legacy_set_and_reports_signature() {
        let whitelist = Whitelist::from_sources("DEADBEEF\n", "", "", "");
        let mut result = result_with(&[], vec![]);
        result.checksum = Some(0xDEAD_BEEF);
        result.v2sum_state = V2SumState::Invalid;

        assert_eq!(
            report(&result, &whitelist),
            vec!["Checksum: DEADBEEF", "Signature: invalid (INVALID)"]
        );

        result.v2sum_state = V2SumState::Valid;
        assert_eq!(
            report(&result, &whitelist),
            vec!["Checksum: DEADBEEF", "Signature: valid"]
        );
    }

    #[test]
    fn test_reports_console_commands() {
        let whitelist = Whitelist::from_sources("", "sar_\n", "", "");
        let result = result_with(&["sar_speedrun_start", "noclip"], vec![]);

        assert_eq!(
            report_tail(&result, &whitelist),
            vec!["Command: sar_speedrun_start", "Command: noclip (INVALID)"]
        );
    }

    #[test]
    fn test_reports_cvars() {
        let whitelist = Whitelist::from_sources("", "", "sensitivity\ncl_fov 200\n", "");
        let cvar = |cvar: &str, val: &str| SarData::InitialCvar {
            cvar: cvar.to_owned(),
            val: val.to_owned(),
        };
        let result = result_with(
            &[],
            vec![
                cvar("cl_fov", "100"),
                cvar("cl_fov", "200"),
                cvar("sensitivity", "3"),
                cvar("sv_gravity", "300"),
            ],
        );

        assert_eq!(
            report_tail(&result, &whitelist),
            vec![
                "Cvar: cl_fov 100",
                "Cvar: cl_fov 200 (INVALID)",
                "Cvar: sensitivity 3",
                "Cvar: sv_gravity 300 (INVALID)",
            ]
        );
    }

    #[test]
    fn test_reports_timing_records() {
        let result = result_with(
            &[],
            vec![
                SarData::Pause { pause_ticks: 90 },
                SarData::WaitRun {
                    tick: 600,
                    cmd: "load quick".to_owned(),
                },
                SarData::HwaitRun {
                    ticks: 30,
                    cmd: "+jump".to_owned(),
                },
                SarData::SpeedrunTime {
                    splits: vec![SpeedrunSplit {
                        name: "Chapter 1".to_owned(),
                        segs: vec![
                            SpeedrunSegment {
                                name: "Container Ride".to_owned(),
                                ticks: 3600,
                            },
                            SpeedrunSegment {
                                name: "Portal Carousel".to_owned(),
                                ticks: 30,
                            },
                        ],
                    }],
                },
                SarData::Timestamp(Timestamp {
                    year: 2023,
                    mon: 5,
                    day: 9,
                    hour: 3,
                    min: 7,
                    sec: 0,
                }),
            ],
        );

        assert_eq!(
            report_tail(&result, &Whitelist::new()),
            vec![
                "Pause: 90 ticks (1.500s)",
                "Wait: tick 600: load quick",
                "Hwait: 30 ticks: +jump",
                "Speedrun: 1 splits",
                "Segment: Chapter 1/Container Ride: 3600 ticks",
                "Segment: Chapter 1/Portal Carousel: 30 ticks",
                "Total: Chapter 1: 0:01:00.500 (3630 ticks)",
                "Recorded: 2023/05/09 03:07:00 UTC",
            ]
        );
    }

    #[test]
    fn test_reports_file_checksums() {
        let whitelist = Whitelist::from_sources("", "", "", "./portal2/pak01_dir.vpk 0000CAFE\n");
        let file = |path: &str, sum: u32| SarData::FileChecksum {
            sum,
            path: path.to_owned(),
        };
        let result = result_with(
            &[],
            vec![
                file("./portal2/pak01_dir.vpk", 0xCAFE),
                file("./portal2/pak01_dir.vpk", 0xBEEF),
                file("./portal2/bin/server.dll", 1),
                file("./portal2/maps/sp_a1_intro1.bsp", 2),
                file("./portal2_dlc1/pak01_dir.vpk", 3),
                file("./other/foo.vpk", 4),
            ],
        );

        assert_eq!(
            report_tail(&result, &whitelist),
            vec![
                "File: ./portal2/pak01_dir.vpk 0000CAFE",
                "File: ./portal2/pak01_dir.vpk 0000BEEF (INVALID)",
                "File: ./other/foo.vpk 00000004 (INVALID)",
            ]
        );
    }

    #[test]
    fn test_silent_records_and_invalid_data() {
        let result = result_with(
            &[],
            vec![
                SarData::ChallengeFlags { slot: 0 },
                SarData::CrouchFly { slot: 1 },
                SarData::Invalid,
                SarData::Checksum {
                    demo_sum: 1,
                    sar_sum: 2,
                },
            ],
        );

        assert_eq!(
            report_tail(&result, &Whitelist::new()),
            vec!["Invalid: corrupted data (INVALID)"]
        );
    }

    #[test]
    fn test_counts_timescale_changes() {
        let whitelist = Whitelist::new();
        let result = result_with(
            &[],
            vec![
                SarData::TimescaleCheat { timescale: 2.0 },
                SarData::Pause { pause_ticks: 1 },
                SarData::TimescaleCheat { timescale: 1.0 },
            ],
        );

        let mut validator = Validator::new(&whitelist);
        let mut lines: Vec<ReportLine> = Vec::new();
        validator.validate(&result, &mut lines);

        assert_eq!(validator.timescale_changes(), 2);
        assert_eq!(lines[1].to_string(), "Timescale: 2");
        assert_eq!(lines[3].to_string(), "Timescale: 1");
    }
}
