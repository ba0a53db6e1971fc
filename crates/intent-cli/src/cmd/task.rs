use super::{open_hub, parse_json};
use crate::output::{print_json, print_table, truncate};
use anyhow::{bail, Context};
use clap::Subcommand;
use intent_core::task_queue::{QueueTask, TaskId, TaskStatus};
use serde_json::Value;
use std::path::Path;

#[derive(Subcommand)]
pub enum TaskSubcommand {
    /// Enqueue a task with a JSON payload
    Assign {
        /// Payload as JSON
        payload: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Claim the oldest pending task
    Claim,
    /// Show one task
    Status { task_id: String },
    /// Print a finished task's result (null while unfinished)
    Result { task_id: String },
    /// Mark an in-progress task completed
    Complete {
        task_id: String,
        /// Result as JSON
        #[arg(long, default_value = "null")]
        result: String,
    },
    /// Mark an in-progress task failed
    Fail {
        task_id: String,
        #[arg(required = true)]
        error: Vec<String>,
    },
    /// Cancel a pending task
    Cancel { task_id: String },
    /// Edit a pending task
    Update {
        task_id: String,
        /// JSON object merged into the payload
        #[arg(long)]
        payload: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List tasks in creation order
    List {
        /// Filter by status (pending, in_progress, completed, failed, cancelled)
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
}

pub fn run(root: &Path, subcmd: TaskSubcommand, json: bool) -> anyhow::Result<()> {
    let hub = open_hub(root)?;
    let tasks = hub.tasks();

    match subcmd {
        TaskSubcommand::Assign {
            payload,
            description,
        } => {
            let task = tasks.enqueue(parse_json("payload", &payload)?, description)?;
            if json {
                print_json(&serde_json::json!({ "task_id": task.id }))
            } else {
                println!("Assigned task [{}]", task.id);
                Ok(())
            }
        }
        TaskSubcommand::Claim => match tasks.claim_next()? {
            Some(task) => show(&task, json),
            None if json => print_json(&Value::Null),
            None => {
                println!("No pending tasks.");
                Ok(())
            }
        },
        TaskSubcommand::Status { task_id } => show(&tasks.status(parse_id(&task_id)?)?, json),
        TaskSubcommand::Result { task_id } => {
            print_json(&tasks.result(parse_id(&task_id)?)?.unwrap_or(Value::Null))
        }
        TaskSubcommand::Complete { task_id, result } => {
            let id = parse_id(&task_id)?;
            let task = tasks.complete(id, parse_json("result", &result)?)?;
            report(&task, json)
        }
        TaskSubcommand::Fail { task_id, error } => {
            let task = tasks.fail(parse_id(&task_id)?, &error.join(" "))?;
            report(&task, json)
        }
        TaskSubcommand::Cancel { task_id } => {
            let task = tasks.cancel(parse_id(&task_id)?)?;
            report(&task, json)
        }
        TaskSubcommand::Update {
            task_id,
            payload,
            description,
        } => {
            let patch = match payload {
                Some(text) => match parse_json("payload", &text)? {
                    Value::Object(map) => Some(map),
                    _ => bail!("--payload must be a JSON object"),
                },
                None => None,
            };
            let task = tasks.update(parse_id(&task_id)?, patch, description)?;
            report(&task, json)
        }
        TaskSubcommand::List { status, limit } => {
            let status = status
                .map(|s| s.parse::<TaskStatus>())
                .transpose()
                .context("invalid --status")?;
            list(&tasks.list(status, limit)?, json)
        }
    }
}

fn parse_id(raw: &str) -> anyhow::Result<TaskId> {
    raw.parse::<TaskId>()
        .with_context(|| format!("'{raw}' is not a task id"))
}

fn report(task: &QueueTask, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(task);
    }
    println!("Task [{}] is now {}", task.id, task.status);
    Ok(())
}

fn show(task: &QueueTask, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(task);
    }
    println!("Task [{}]", task.id);
    println!("  status:  {}", task.status);
    if let Some(d) = &task.description {
        println!("  about:   {d}");
    }
    println!("  created: {}", task.created_at.to_rfc3339());
    if let Some(t) = task.started_at {
        println!("  started: {}", t.to_rfc3339());
    }
    if let Some(t) = task.completed_at {
        println!("  ended:   {}", t.to_rfc3339());
    }
    println!("  payload: {}", task.payload);
    if let Some(r) = &task.result {
        println!("  result:  {r}");
    }
    Ok(())
}

fn list(tasks: &[QueueTask], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&tasks);
    }
    if tasks.is_empty() {
        println!("No tasks.");
        return Ok(());
    }
    let rows = tasks
        .iter()
        .map(|t| {
            vec![
                t.id.to_string(),
                t.status.to_string(),
                t.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                truncate(t.description.as_deref().unwrap_or(""), 50),
            ]
        })
        .collect();
    print_table(&["ID", "STATUS", "CREATED", "DESCRIPTION"], rows);
    Ok(())
}
