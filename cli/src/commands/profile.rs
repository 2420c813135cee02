use anyhow::{Result, bail};
use std::process;
use tracing::warn;

use proteus_core::models::{FitnessGoal, ProfileUpdate, RemoteProfile, SyncDirection};
use proteus_core::nutrition::{protein_per_kg_for_goal, recommended_protein};
use proteus_core::service::ProteusService;
use proteus_core::sync::SyncOutcome;

use super::helpers::json_error;

/// Profile fields as given on the command line; all optional so a single
/// field can be changed.
#[derive(Debug, Default)]
pub(crate) struct ProfileArgs {
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub activity: Option<String>,
    pub goal: Option<String>,
}

impl ProfileArgs {
    fn to_update(&self) -> Result<ProfileUpdate> {
        Ok(ProfileUpdate {
            weight: self.weight,
            height: self.height,
            age: self.age,
            gender: self.gender.as_deref().map(str::parse).transpose()?,
            activity_level: self.activity.as_deref().map(str::parse).transpose()?,
            fitness_goal: self.goal.as_deref().map(str::parse).transpose()?,
        })
    }
}

/// Layer `update` over the stored profile. Without a stored profile every
/// field must be given.
fn build_profile(
    existing: Option<&RemoteProfile>,
    update: &ProfileUpdate,
) -> Result<RemoteProfile> {
    if let Some(existing) = existing {
        return Ok(existing.merged(update));
    }

    let missing: Vec<&str> = [
        ("--weight", update.weight.is_none()),
        ("--height", update.height.is_none()),
        ("--age", update.age.is_none()),
        ("--gender", update.gender.is_none()),
        ("--activity", update.activity_level.is_none()),
        ("--goal", update.fitness_goal.is_none()),
    ]
    .into_iter()
    .filter_map(|(flag, absent)| absent.then_some(flag))
    .collect();

    let (
        Some(weight),
        Some(height),
        Some(age),
        Some(gender),
        Some(activity_level),
        Some(fitness_goal),
    ) = (
        update.weight,
        update.height,
        update.age,
        update.gender,
        update.activity_level,
        update.fitness_goal,
    )
    else {
        bail!("No profile stored yet; missing {}", missing.join(", "));
    };
    Ok(RemoteProfile {
        weight,
        height,
        age,
        gender,
        activity_level,
        fitness_goal,
    })
}

pub(crate) async fn cmd_profile_set(
    svc: &ProteusService,
    args: &ProfileArgs,
    json: bool,
) -> Result<()> {
    let update = args.to_update()?;
    if update == ProfileUpdate::default() {
        bail!(
            "Nothing to update. Pass at least one of --weight, --height, --age, --gender, --activity, --goal"
        );
    }
    let profile = build_profile(svc.profile().as_ref(), &update)?;

    let outcome = if svc.user_id().is_some() {
        match svc.sync_profile(&profile, SyncDirection::ToRemote).await {
            Err(e) if e.is_remote_unavailable() => {
                warn!(error = %e, "profile push failed, falling back to local update");
                eprintln!("Warning: {e}. Updating the local profile only.");
                svc.sync_profile(&profile, SyncDirection::ToLocal).await?
            }
            other => other?,
        }
    } else {
        svc.sync_profile(&profile, SyncDirection::ToLocal).await?
    };

    print_outcome(&outcome, json)
}

pub(crate) async fn cmd_profile_pull(svc: &ProteusService, json: bool) -> Result<()> {
    let outcome = svc.refresh_from_remote().await?;
    print_outcome(&outcome, json)
}

fn print_outcome(outcome: &SyncOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        if !outcome.is_completed() {
            process::exit(2);
        }
        return Ok(());
    }

    match outcome {
        SyncOutcome::Completed(report) => {
            let direction = match report.direction {
                SyncDirection::ToLocal => "local",
                SyncDirection::ToRemote => "remote",
            };
            let target = report.recommendation.recommended;
            let current = report.recommendation.current;
            println!("Profile synced ({direction})");
            println!("  TARGET: {target:.0}g protein | TODAY: {current:.1}g");
            if report.remote_accepted == Some(false) {
                eprintln!("Warning: the remote store declined the update");
            }
            Ok(())
        }
        SyncOutcome::Skipped { reason } => {
            eprintln!("Sync skipped: {reason}");
            process::exit(2);
        }
    }
}

pub(crate) fn cmd_profile_show(svc: &ProteusService, json: bool) -> Result<()> {
    let rec = svc.recommendation();
    let Some(profile) = &rec.profile else {
        if json {
            println!("{}", json_error("No profile set"));
        } else {
            eprintln!("No profile set. Run `proteus profile set` first.");
        }
        process::exit(2);
    };

    if json {
        println!(
            "{}",
            serde_json::json!({ "profile": profile, "recommended": rec.recommended })
        );
        return Ok(());
    }

    let w = profile.weight;
    let h = profile.height;
    let age = profile.age;
    let gender = serde_json::to_value(profile.gender)?;
    let activity = serde_json::to_value(profile.activity_level)?;
    let goal = profile.fitness_goal;
    let target = rec.recommended;
    println!("  Weight:   {w:.1} kg");
    println!("  Height:   {h:.0} cm");
    println!("  Age:      {age}");
    println!("  Gender:   {}", gender.as_str().unwrap_or("?"));
    println!("  Activity: {}", activity.as_str().unwrap_or("?"));
    println!("  Goal:     {goal}");
    println!("  TARGET:   {target:.0}g protein/day");
    Ok(())
}

/// Daily target for a bodyweight and goal, without touching any state.
pub(crate) fn cmd_recommend(weight: f64, goal: &str, json: bool) -> Result<()> {
    if !weight.is_finite() || weight <= 0.0 {
        bail!("Weight must be greater than 0");
    }
    let goal: FitnessGoal = goal.parse()?;
    let per_kg = protein_per_kg_for_goal(goal);
    let recommended = recommended_protein(weight, goal);

    if json {
        println!(
            "{}",
            serde_json::json!({
                "weight": weight,
                "goal": goal,
                "protein_per_kg": per_kg,
                "recommended": recommended,
            })
        );
    } else {
        println!("{recommended:.0}g protein/day ({weight:.1} kg x {per_kg} g/kg, {goal})");
    }
    Ok(())
}
