#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use typedocs::{
    client::DocumentClientBuilder,
    memory::MemoryClient,
    prelude::*,
    record::RecordExt,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
pub struct Task {
    pub title: String,
    pub done: bool,
    pub priority: i64,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Projection)]
#[projection(of = Task)]
pub struct TaskTitle {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Projection)]
#[projection(of = Task)]
pub struct TaskStatus {
    pub done: bool,
    pub priority: i64,
}

pub const TASKS: &str = "tasks";

pub fn task_id(n: usize) -> String {
    format!("t{n:02}")
}

/// Task `n` has priority `n % 3`, so priorities repeat and ties are common.
pub fn task(n: usize) -> Task {
    Task {
        title: format!("task {n}"),
        done: false,
        priority: (n % 3) as i64,
        tags: vec!["open".to_string()],
    }
}

/// A database holding tasks `t01..=tNN`.
pub async fn seeded_db(count: usize) -> Database<MemoryClient> {
    let mut builder = MemoryClient::builder();

    for n in 1..=count {
        builder = builder.with_document(TASKS, task_id(n), task(n).to_document().unwrap());
    }

    Database::new(builder.build().await.unwrap())
}

pub fn ids<P>(documents: &[MutableDocument<'_, MemoryClient, Task, P>]) -> Vec<String> {
    documents
        .iter()
        .map(|document| document.id.clone())
        .collect()
}
