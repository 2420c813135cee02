mod helpers;
mod log;
mod profile;
mod summary;

pub(crate) use log::{cmd_add, cmd_remove};
pub(crate) use profile::{
    ProfileArgs, cmd_profile_pull, cmd_profile_set, cmd_profile_show, cmd_recommend,
};
pub(crate) use summary::{cmd_history, cmd_intake, cmd_show};
