use crate::Task;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreateTaskRequest {
    pub name: String,
    /// Raw status value; validated against [`Status`](crate::Status).
    pub status: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GetTaskRequest {
    pub id: String,
}

/// The fields an update may carry. Only those named by the update mask are
/// applied.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub name: String,
    pub status: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateTaskRequest {
    pub id: String,
    pub task: Option<TaskPatch>,
    pub update_mask: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeleteTaskRequest {
    pub id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListTasksRequest {
    /// Token from a previous response; empty starts from the beginning.
    pub page_token: String,
    /// Zero means "use the token's size, or the default".
    pub page_size: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListTasksResponse {
    pub tasks: Vec<Task>,
    /// Present when the page was full and more tasks may follow.
    pub next_page_token: Option<String>,
}
