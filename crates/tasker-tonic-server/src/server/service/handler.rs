//! gRPC service implementation for task records.
//!
//! [`TaskHandler`] implements the generated [`TaskService`] trait on top of a
//! [`TaskManager`]. Each RPC translates its wire message into a task request,
//! runs it inside a span named after the operation, records request metrics
//! and maps the outcome to a `tonic::Status`.

use crate::server::{
    config::ServerConfig,
    telemetry::{
        increment_errors, increment_requests, observe_rollbacks, record_request_duration,
    },
};
use core::future::Future;
use portable_atomic::{AtomicBool, Ordering};
use std::{sync::Arc, time::Instant};
use tasker_tonic_core::{
    Error, Generator, generator,
    proto::{self, task_service_server::TaskService},
    tasker::{
        CreateTaskRequest, ListTasksRequest, ListTasksResponse, MemoryStore, Task, TaskManager,
        TaskPatch, UpdateTaskRequest,
    },
};
use tonic::{Request, Response, Status};
use tracing::Instrument;

pub type Manager = TaskManager<MemoryStore, Generator>;

/// gRPC front end of a single node.
///
/// Cloning is cheap; clones share the manager and the shutdown flag.
#[derive(Clone)]
pub struct TaskHandler {
    manager: Arc<Manager>,
    shutting_down: Arc<AtomicBool>,
}

impl TaskHandler {
    /// Builds the store, generator and manager described by `config`.
    pub fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        let generator = generator(config.node_id)?;
        let manager = TaskManager::new(
            Arc::new(MemoryStore::new()),
            Arc::new(generator),
            config.page_token_codec(),
        )
        .with_keyspace(config.keyspace.clone())
        .with_page_limits(config.page_limits)
        .with_id_attempts(config.id_attempts);

        let manager = Arc::new(manager);
        let observed = Arc::clone(&manager);
        observe_rollbacks(move || observed.rollback_count());

        Ok(Self {
            manager,
            shutting_down: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    /// Rejects every request that arrives after this call.
    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
    }

    async fn observe<T, F>(&self, op: &'static str, fut: F) -> Result<Response<T>, Status>
    where
        F: Future<Output = tasker_tonic_core::Result<T>>,
    {
        increment_requests(op);
        if self.shutting_down.load(Ordering::Acquire) {
            increment_errors(op);
            return Err(Error::ServiceShutdown.into());
        }

        let start = Instant::now();
        let result = fut.instrument(tracing::info_span!("rpc", op)).await;
        record_request_duration(op, start.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(value) => Ok(Response::new(value)),
            Err(err) => {
                increment_errors(op);
                match &err {
                    Error::Task(tasker_tonic_core::tasker::Error::Internal { .. }) => {
                        tracing::error!(op, error = %err, "request failed");
                    }
                    _ => tracing::debug!(op, error = %err, "request rejected"),
                }
                Err(err.into())
            }
        }
    }
}

#[tonic::async_trait]
impl TaskService for TaskHandler {
    async fn create_task(
        &self,
        req: Request<proto::CreateTaskRequest>,
    ) -> Result<Response<proto::Task>, Status> {
        let req = req.into_inner();
        self.observe("create", async {
            let task = self
                .manager
                .create(CreateTaskRequest {
                    name: req.name,
                    status: req.status,
                })
                .await?;
            Ok(to_wire(task))
        })
        .await
    }

    async fn get_task(
        &self,
        req: Request<proto::GetTaskRequest>,
    ) -> Result<Response<proto::Task>, Status> {
        let req = req.into_inner();
        self.observe("get", async {
            Ok(to_wire(self.manager.get(&req.id).await?))
        })
        .await
    }

    async fn update_task(
        &self,
        req: Request<proto::UpdateTaskRequest>,
    ) -> Result<Response<proto::Task>, Status> {
        let req = req.into_inner();
        self.observe("update", async {
            let request = update_request(req)?;
            Ok(to_wire(self.manager.update(request).await?))
        })
        .await
    }

    async fn delete_task(
        &self,
        req: Request<proto::DeleteTaskRequest>,
    ) -> Result<Response<()>, Status> {
        let req = req.into_inner();
        self.observe("delete", async {
            self.manager.delete(&req.id).await?;
            Ok(())
        })
        .await
    }

    async fn get_task_list(
        &self,
        req: Request<proto::GetTaskListRequest>,
    ) -> Result<Response<proto::GetTaskListResponse>, Status> {
        let req = req.into_inner();
        self.observe("list", async {
            let page = self
                .manager
                .list(ListTasksRequest {
                    page_token: req.page_token,
                    page_size: req.page_size,
                })
                .await?;
            Ok(list_to_wire(page))
        })
        .await
    }
}

fn to_wire(task: Task) -> proto::Task {
    proto::Task {
        id: task.id,
        name: task.name,
        status: task.status as i32,
    }
}

fn list_to_wire(page: ListTasksResponse) -> proto::GetTaskListResponse {
    proto::GetTaskListResponse {
        tasks: page.tasks.into_iter().map(to_wire).collect(),
        next_token: page.next_page_token.unwrap_or_default(),
    }
}

/// The id travels both on the request and inside the task; a task id that is
/// set must agree with the request id.
fn update_request(req: proto::UpdateTaskRequest) -> tasker_tonic_core::Result<UpdateTaskRequest> {
    if let Some(task) = req.task.as_ref().filter(|t| !t.id.is_empty()) {
        if task.id != req.id {
            return Err(Error::InvalidRequest {
                reason: format!("task id {} does not match request id {}", task.id, req.id),
            });
        }
    }
    Ok(UpdateTaskRequest {
        id: req.id,
        task: req.task.map(|task| TaskPatch {
            name: task.name,
            status: task.status,
        }),
        update_mask: req.update_mask.map(|mask| mask.paths).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::config::CliArgs;
    use clap::Parser;
    use prost_types::FieldMask;
    use tonic::Code;

    fn handler() -> TaskHandler {
        let args = CliArgs::try_parse_from(["tasker-tonic-server", "--node-id", "3"]).unwrap();
        TaskHandler::new(&ServerConfig::try_from(args).unwrap()).unwrap()
    }

    async fn create(handler: &TaskHandler, name: &str) -> proto::Task {
        handler
            .create_task(Request::new(proto::CreateTaskRequest {
                name: name.to_string(),
                status: proto::Status::Todo as i32,
            }))
            .await
            .unwrap()
            .into_inner()
    }

    #[test]
    fn update_mask_paths_are_forwarded() {
        let req = update_request(proto::UpdateTaskRequest {
            id: "7".into(),
            task: Some(proto::Task {
                id: String::new(),
                name: "n".into(),
                status: proto::Status::Done as i32,
            }),
            update_mask: Some(FieldMask {
                paths: vec!["name".into(), "task.status".into()],
            }),
        })
        .unwrap();
        assert_eq!(req.id, "7");
        assert_eq!(req.update_mask, ["name", "task.status"]);
        assert_eq!(
            req.task,
            Some(TaskPatch {
                name: "n".into(),
                status: 2
            })
        );
    }

    #[test]
    fn missing_mask_is_empty() {
        let req = update_request(proto::UpdateTaskRequest {
            id: "7".into(),
            task: None,
            update_mask: None,
        })
        .unwrap();
        assert!(req.update_mask.is_empty());
        assert!(req.task.is_none());
    }

    #[test]
    fn conflicting_ids_are_rejected() {
        let err = update_request(proto::UpdateTaskRequest {
            id: "7".into(),
            task: Some(proto::Task {
                id: "8".into(),
                ..Default::default()
            }),
            update_mask: None,
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest { .. }));
    }

    #[test]
    fn wire_status_matches_domain_status() {
        use tasker_tonic_core::tasker::Status as Domain;
        for status in Domain::ALL {
            let wire = proto::Status::try_from(status as i32).unwrap();
            assert_eq!(wire.as_str_name(), format!("STATUS_{}", status.as_str()));
        }
    }

    #[tokio::test]
    async fn crud_over_the_service() {
        let handler = handler();
        let task = create(&handler, "write docs").await;
        assert!(!task.id.is_empty());

        let fetched = handler
            .get_task(Request::new(proto::GetTaskRequest {
                id: task.id.clone(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(fetched, task);

        let updated = handler
            .update_task(Request::new(proto::UpdateTaskRequest {
                id: task.id.clone(),
                task: Some(proto::Task {
                    status: proto::Status::Done as i32,
                    ..Default::default()
                }),
                update_mask: Some(FieldMask {
                    paths: vec!["status".into()],
                }),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(updated.name, "write docs");
        assert_eq!(updated.status, proto::Status::Done as i32);

        handler
            .delete_task(Request::new(proto::DeleteTaskRequest {
                id: task.id.clone(),
            }))
            .await
            .unwrap();
        let status = handler
            .get_task(Request::new(proto::GetTaskRequest { id: task.id }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn list_pages_through_every_task() {
        let handler = handler();
        let mut created = Vec::new();
        for i in 0..5 {
            created.push(create(&handler, &format!("task {i}")).await.id);
        }

        let mut seen = Vec::new();
        let mut token = String::new();
        loop {
            let page = handler
                .get_task_list(Request::new(proto::GetTaskListRequest {
                    page_token: token,
                    page_size: 2,
                }))
                .await
                .unwrap()
                .into_inner();
            seen.extend(page.tasks.into_iter().map(|t| t.id));
            if page.next_token.is_empty() {
                break;
            }
            token = page.next_token;
        }
        assert_eq!(seen, created);
    }

    #[tokio::test]
    async fn invalid_input_maps_to_invalid_argument() {
        let handler = handler();
        let status = handler
            .create_task(Request::new(proto::CreateTaskRequest {
                name: "  ".into(),
                status: 0,
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);

        let status = handler
            .create_task(Request::new(proto::CreateTaskRequest {
                name: "x".into(),
                status: 9,
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn requests_after_shutdown_are_unavailable() {
        let handler = handler();
        handler.clone().shutdown();
        let status = handler
            .get_task(Request::new(proto::GetTaskRequest { id: "1".into() }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);
    }
}
