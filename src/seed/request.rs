// Seed command parameters

use serde::{Deserialize, Serialize};

pub const DEFAULT_PATIENT_COUNT: u32 = 40;
pub const DEFAULT_CRM_DATA_DAY_COUNT: u32 = 100;
pub const DEFAULT_RPM_DATA_DAY_COUNT: u32 = 100;

/// Prompt printed by `refresh_db` before it touches the database
pub const CONFIRM_PROMPT: &str =
    r"This command will seed new data\(and optionally wipe the database\)\. Continue\? \(Y/N\)";

/// Answer sent to [`CONFIRM_PROMPT`]
pub const CONFIRM_RESPONSE: &str = "y\n";

/// Volume and behaviour of one seeding run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedRequest {
    /// Number of patients to create
    pub patient_count: u32,
    /// Days of CRM data to create
    pub crm_data_day_count: u32,
    /// Days of RPM data to create
    pub rpm_data_day_count: u32,
    /// Seed on top of the current database instead of wiping it
    pub skip_db_wipe: bool,
    /// Keep base data when wiping
    pub keep_base_data: bool,
    /// Profile the seeding command
    pub profile: bool,
}

impl Default for SeedRequest {
    fn default() -> Self {
        Self {
            patient_count: DEFAULT_PATIENT_COUNT,
            crm_data_day_count: DEFAULT_CRM_DATA_DAY_COUNT,
            rpm_data_day_count: DEFAULT_RPM_DATA_DAY_COUNT,
            skip_db_wipe: false,
            keep_base_data: false,
            profile: false,
        }
    }
}

impl SeedRequest {
    /// Arguments passed to `refresh_db`
    pub fn to_args(&self) -> String {
        let mut args = format!(
            "--patient_count {} --crm_data_day_count {} --rpm_data_day_count {}",
            self.patient_count, self.crm_data_day_count, self.rpm_data_day_count
        );
        if self.skip_db_wipe {
            args.push_str(" --skip_db_wipe");
        }
        if self.keep_base_data {
            args.push_str(" --keep_base_data");
        }
        if self.profile {
            args.push_str(" --profile");
        }
        args
    }

    /// The management command line, without the exec prefix
    pub fn management_command(&self) -> String {
        format!("refresh_db {} --confirm", self.to_args())
    }
}
