// src/commands/create.rs

use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::cli::CreateArgs;
use crate::commands::magic::{MagicResolver, MagicVars};
use crate::commands::{ClientContext, Messages, multirun, print_response};
use crate::config::load_submission;
use crate::ipc::Request;
use crate::task::{ResourceSpec, TaskSpec, TaskSubmission};

const MESSAGES: Messages = Messages {
    done: "created",
    action: "create",
    no_op: None,
};

/// `meow create`.
pub async fn create(ctx: &ClientContext, args: &CreateArgs) -> Result<bool> {
    let daemon_pid = ctx.ensure_daemon().await?;
    let run_dir = ctx.settings.cache().daemon_dir(daemon_pid);

    let mut submissions = if is_submission_file(&args.input) {
        if !args.args.is_empty() {
            bail!("extra arguments after `--` are only supported for command strings");
        }
        submissions_from_file(Path::new(&args.input))?
    } else {
        submissions_from_command(args)?
    };

    let resolver = MagicResolver::new()?;
    for_each_spec(&mut submissions, |spec| {
        apply_overrides(spec, args);
        let vars = MagicVars {
            task_name: spec.name.clone(),
            run_dir: Some(run_dir.clone()),
        };
        spec.cmd = resolver.resolve(&spec.cmd, &vars);
        for hook in [&mut spec.hooks.on_start, &mut spec.hooks.on_end]
            .into_iter()
            .flatten()
        {
            *hook = resolver.resolve(hook, &vars);
        }
    });

    debug!(count = submissions.len(), "submitting tasks");
    let response = ctx.client.send(&Request::Create { submissions }).await?;
    Ok(print_response(&response, MESSAGES))
}

fn is_submission_file(input: &str) -> bool {
    let path = Path::new(input);
    path.extension().is_some_and(|ext| ext == "toml") && path.is_file()
}

fn submissions_from_file(path: &Path) -> Result<Vec<TaskSubmission>> {
    let file = load_submission(path)
        .with_context(|| format!("loading submission file {}", path.display()))?;

    let base_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    let base_dir = base_dir.canonicalize().unwrap_or(base_dir);

    Ok(file.into_submissions(&base_dir))
}

/// One task per (multirun-expanded) argument set.
fn submissions_from_command(args: &CreateArgs) -> Result<Vec<TaskSubmission>> {
    if args.input.trim().is_empty() {
        bail!("Invalid command string: empty command");
    }
    let cwd = std::env::current_dir()?;

    let arg_sets = if args.multirun && !args.args.is_empty() {
        multirun::expand(&args.args)
    } else {
        vec![args.args.clone()]
    };

    Ok(arg_sets
        .into_iter()
        .map(|extra| {
            let mut cmd = args.input.trim().to_string();
            for arg in extra {
                cmd.push(' ');
                cmd.push_str(&arg);
            }
            let mut spec = TaskSpec::new(cmd);
            spec.cwd = Some(cwd.clone());
            TaskSubmission::Single(spec)
        })
        .collect())
}

/// Command-line flags win over anything the description says. Any resource
/// flag makes the task device-bound.
fn apply_overrides(spec: &mut TaskSpec, args: &CreateArgs) {
    if let Some(name) = &args.task_name {
        spec.name = Some(name.clone());
    }
    if let Some(priority) = args.priority {
        spec.priority = priority;
    }

    if args.has_resource_overrides() {
        let res = spec.resources.get_or_insert_with(ResourceSpec::default);
        if !args.visible_devices.is_empty() {
            res.visible_devices = Some(args.visible_devices.clone());
        }
        if let Some(memory) = args.requires_memory_per_device {
            res.requires_memory_per_device = memory;
        }
        if let Some(min) = args.min_devices {
            res.min_devices = min;
        }
    }
}

fn for_each_spec(submissions: &mut [TaskSubmission], mut f: impl FnMut(&mut TaskSpec)) {
    for submission in submissions {
        match submission {
            TaskSubmission::Single(spec) => f(spec),
            TaskSubmission::Group(group) => group.tasks.iter_mut().for_each(&mut f),
        }
    }
}
