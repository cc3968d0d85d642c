// src/commands/multirun.rs

//! Multirun expansion of extra command arguments.
//!
//! Every argument written as a list expands the run:
//!
//! ```text
//! -s [1,2] lr=[a,b]
//! ```
//!
//! becomes the four argument sets `-s 1 lr=a`, `-s 1 lr=b`, `-s 2 lr=a` and
//! `-s 2 lr=b`.

/// Cartesian product of the list arguments in `args`, in argument order.
pub fn expand(args: &[String]) -> Vec<Vec<String>> {
    let choices: Vec<Vec<String>> = args.iter().map(|arg| alternatives(arg)).collect();

    choices.iter().fold(vec![Vec::new()], |runs, options| {
        runs.iter()
            .flat_map(|prefix| {
                options.iter().map(move |option| {
                    let mut run = prefix.clone();
                    run.push(option.clone());
                    run
                })
            })
            .collect()
    })
}

/// The values one argument can take; a single value for plain arguments.
fn alternatives(arg: &str) -> Vec<String> {
    if let Some((key, value)) = arg.split_once('=') {
        return parse_list(value)
            .into_iter()
            .map(|v| format!("{key}={v}"))
            .collect();
    }
    parse_list(arg)
}

fn parse_list(value: &str) -> Vec<String> {
    match value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
    {
        Some(inner) => inner.split(',').map(|v| v.trim().to_string()).collect(),
        None => vec![value.to_string()],
    }
}
