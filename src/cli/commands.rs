use clap::Subcommand;

use super::credentials::CredentialsArgs;
use super::exercise::ExerciseArgs;
use super::policy::PolicyArgs;
use super::profiles::ProfilesArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Run a scripted shopping trip end to end and stream its events
    Exercise(ExerciseArgs),

    /// List site profiles or show one in detail
    Profiles(ProfilesArgs),

    /// Show the effective policy and where each value came from
    Policy(PolicyArgs),

    /// Manage saved login identifiers
    Credentials(CredentialsArgs),

    /// Show version, build and configuration information
    Info,
}
