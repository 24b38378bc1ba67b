/// Server-side scripts that keep a task's primary entry and its index entry
/// in agreement.
///
/// `AddTask` and `DeleteTask` take `KEYS = [primary key, index key]`;
/// `UpdateTask` takes `KEYS = [primary key]`.
///
/// A script that rejects its input replies with an error of its own after
/// restoring what it changed; a store maps that to
/// [`StoreError::ScriptFailed`](crate::StoreError::ScriptFailed). Any other
/// error raised mid-script leaves earlier writes in place and maps to
/// [`StoreError::Aborted`](crate::StoreError::Aborted).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Script {
    /// `ARGV = [serialized task, index member]`. Writes the primary entry,
    /// then adds the member to the index with the member as score. If the add does not report
    /// exactly one new member the primary entry is deleted again and the
    /// script fails.
    AddTask,
    /// `ARGV = [index member]`. Removes the primary entry, then removes the
    /// member from the index. If the primary entry was already gone nothing
    /// is changed and the script fails; if the index removal does not report
    /// exactly one member the primary entry is restored to its prior value
    /// and the script fails.
    DeleteTask,
    /// `ARGV = [serialized task]`. Overwrites the primary entry only if it
    /// still exists, so an update racing a delete cannot resurrect a record
    /// that is no longer indexed.
    UpdateTask,
}

impl Script {
    /// Stable name of the script.
    pub const fn id(&self) -> &'static str {
        match self {
            Self::AddTask => "add_task",
            Self::DeleteTask => "delete_task",
            Self::UpdateTask => "update_task",
        }
    }

    /// Lua source for Redis-compatible stores.
    pub const fn source(&self) -> &'static str {
        match self {
            Self::AddTask => ADD_TASK,
            Self::DeleteTask => DELETE_TASK,
            Self::UpdateTask => UPDATE_TASK,
        }
    }

    /// Number of `KEYS` entries the script expects.
    pub const fn key_count(&self) -> usize {
        match self {
            Self::AddTask | Self::DeleteTask => 2,
            Self::UpdateTask => 1,
        }
    }

    /// Number of `ARGV` entries the script expects.
    pub const fn arity(&self) -> usize {
        match self {
            Self::AddTask => 2,
            Self::DeleteTask | Self::UpdateTask => 1,
        }
    }
}

const ADD_TASK: &str = r#"
redis.call("SET", KEYS[1], ARGV[1])
local added = redis.pcall("ZADD", KEYS[2], ARGV[2], ARGV[2])
if added ~= 1 then
    redis.call("DEL", KEYS[1])
    return redis.error_reply("index add failed")
end
return 1
"#;

const DELETE_TASK: &str = r#"
local prior = redis.call("GET", KEYS[1])
if redis.call("DEL", KEYS[1]) ~= 1 then
    return redis.error_reply("task missing")
end
local removed = redis.pcall("ZREM", KEYS[2], ARGV[1])
if removed ~= 1 then
    redis.call("SET", KEYS[1], prior)
    return redis.error_reply("index remove failed")
end
return 1
"#;

const UPDATE_TASK: &str = r#"
if redis.call("EXISTS", KEYS[1]) == 0 then
    return redis.error_reply("task missing")
end
redis.call("SET", KEYS[1], ARGV[1])
return 1
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_touch_both_structures() {
        for script in [Script::AddTask, Script::DeleteTask] {
            let source = script.source();
            assert!(source.contains("KEYS[1]") && source.contains("KEYS[2]"));
            assert!(source.contains("redis.pcall"));
        }
        assert_ne!(Script::AddTask.id(), Script::DeleteTask.id());
        assert!(Script::UpdateTask.source().contains("EXISTS"));
        // both removals are checked
        assert!(Script::DeleteTask.source().contains(r#"redis.call("DEL", KEYS[1]) ~= 1"#));
    }
}
