// src/ipc/router.rs

//! Request routing: decoded requests in, scheduler operations, responses out.

use tracing::{debug, info};

use crate::engine::Scheduler;
use crate::ipc::protocol::{Request, Response};
use crate::task::TaskName;

/// Result of routing one request.
#[derive(Debug, Clone)]
pub struct Routed {
    pub response: Response,
    /// The daemon should stop after replying.
    pub exit: bool,
}

impl Routed {
    fn reply(response: Response) -> Self {
        Self {
            response,
            exit: false,
        }
    }
}

/// Apply `request` to the scheduler.
pub fn route_request(scheduler: &mut Scheduler, request: Request) -> Routed {
    debug!(op = request.op(), "routing request");

    match request {
        Request::Test { name } => Routed::reply(handle_test(scheduler, name)),
        Request::Create { submissions } => {
            Routed::reply(Response::from_report(scheduler.create(submissions)))
        }
        Request::Suspend { names } => {
            Routed::reply(Response::from_report(scheduler.suspend(names)))
        }
        Request::Resume { names } => {
            Routed::reply(Response::from_report(scheduler.resume(names)))
        }
        Request::Kill { names, force } => {
            Routed::reply(Response::from_report(scheduler.kill(names, force)))
        }
        Request::Remove { names } => {
            Routed::reply(Response::from_report(scheduler.remove(names)))
        }
        Request::Exit => {
            info!("exit requested by client");
            Routed {
                response: Response::alive(scheduler.config().daemon_pid),
                exit: true,
            }
        }
    }
}

fn handle_test(scheduler: &Scheduler, name: Option<TaskName>) -> Response {
    match scheduler.test(name.as_deref()) {
        Ok(Some(pid)) => Response::alive(pid),
        Ok(None) => Response {
            ok: false,
            detail: name.map(|n| format!("task {n} is not running")),
            ..Response::default()
        },
        Err(err) => Response {
            ok: false,
            failure: name.into_iter().collect(),
            detail: Some(err.to_string()),
            ..Response::default()
        },
    }
}
