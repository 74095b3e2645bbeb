use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::args::SimConfig;
use crate::logging::EventLog;
use crate::model::{Foreign, Op, TaskState};
use crate::oracle::Oracle;
use crate::scheduler::Scheduler;
use crate::shim::BridgeShim;

pub(crate) fn run(config: &SimConfig, rng: &mut ChaCha8Rng) -> Result<(), String> {
    let shim = BridgeShim::new(config)?;
    let mut tasks: Vec<TaskState> = (0..config.tasks).map(TaskState::new).collect();
    let mut scheduler = Scheduler::new(config.tasks);
    let mut events = EventLog::new(config.first_steps, config.tail_steps);

    let max_steps = config.iterations.unwrap_or(u64::MAX);
    let max_time = config.duration_ms.unwrap_or(u64::MAX);

    let mut step: u64 = 0;
    while step < max_steps && scheduler.now_ms <= max_time {
        let Some(task_id) = scheduler.next_ready(rng) else {
            break;
        };
        let in_flight_tx = tasks.iter().filter(|t| t.txn.is_some()).count();
        let foreign = pick_foreign(&tasks, task_id, rng);
        let op = next_op(&tasks[task_id], in_flight_tx, foreign, config, rng);
        let op_display = format_op(&op);

        let outcome = match shim.apply(&mut tasks[task_id], op.clone()) {
            Ok(outcome) => outcome,
            Err(reason) => {
                events.dump_failure(&reason);
                return Err(reason);
            }
        };
        if let Op::Sleep(ms) = op {
            scheduler.sleep(task_id, ms);
        } else {
            scheduler.mark_ready(task_id);
        }
        let result_label = match &outcome.result {
            Ok(()) => "Ok".to_string(),
            Err(err) => format!("Err({err})"),
        };
        events.record(format!(
            "step={} time={}ms task={} op={} conn={} result={}",
            step,
            scheduler.now_ms,
            task_id,
            op_display,
            outcome.conn.as_deref().unwrap_or("-"),
            result_label
        ));

        if let Err(reason) = Oracle::check(&shim.bridge, &tasks) {
            events.dump_failure(&reason);
            return Err(reason);
        }
        scheduler.tick();
        step += 1;
    }

    let counts = shim
        .bridge
        .resource_counts()
        .map_err(|e| format!("resource_counts failed: {e}"))?;
    tracing::info!(
        "complete: steps={} time={}ms tasks={} live={:?}",
        step,
        scheduler.now_ms,
        config.tasks,
        counts
    );
    Ok(())
}

/// A live transaction, statement or cursor owned by some other task, if any exist.
fn pick_foreign(tasks: &[TaskState], task_id: usize, rng: &mut ChaCha8Rng) -> Option<Foreign> {
    let candidates: Vec<Foreign> = tasks
        .iter()
        .filter(|t| t.id != task_id)
        .flat_map(|t| {
            t.txn
                .iter()
                .cloned()
                .map(Foreign::Transaction)
                .chain(t.statements.iter().cloned().map(Foreign::Statement))
                .chain(t.cursors.iter().cloned().map(Foreign::Cursor))
        })
        .collect();
    if candidates.is_empty() {
        None
    } else {
        let idx = rng.random_range(0..candidates.len());
        candidates.into_iter().nth(idx)
    }
}

fn next_op(
    task: &TaskState,
    in_flight_tx: usize,
    foreign: Option<Foreign>,
    config: &SimConfig,
    rng: &mut ChaCha8Rng,
) -> Op {
    if rng.random::<f64>() < config.sleep_rate {
        return Op::Sleep(rng.random_range(1..=50));
    }
    if task.conn.is_none() {
        return Op::Connect;
    }

    let mut weights = vec![
        (Op::Insert, 0.30),
        (Op::Count, 0.15),
        (Op::DeclareCursor, 0.05),
        (Op::Close, config.close_rate),
    ];
    if let Some(target) = foreign {
        weights.push((Op::Intrude(target), config.intrude_rate));
    }
    if !task.cursors.is_empty() {
        let idx = rng.random_range(0..task.cursors.len());
        weights.push((Op::FetchCursor(idx), 0.15));
    }

    if task.txn.is_some() {
        weights.extend([(Op::Commit, 0.10), (Op::Rollback, 0.08), (Op::Savepoint, 0.10)]);
        if !task.savepoints.is_empty() {
            let idx = rng.random_range(0..task.savepoints.len());
            weights.push((Op::ReleaseSavepoint(idx), 0.05));
            weights.push((Op::RollbackToSavepoint(idx), 0.05));
        }
    } else {
        if in_flight_tx < config.max_in_flight_tx {
            weights.push((Op::Begin, 0.15));
        }
        if task.statements.len() < 4 {
            weights.push((Op::Prepare, 0.05));
        }
        if !task.statements.is_empty() {
            let idx = rng.random_range(0..task.statements.len());
            weights.push((Op::RunPrepared(idx), 0.10));
        }
    }
    choose_weighted(&weights, rng)
}

fn choose_weighted(items: &[(Op, f64)], rng: &mut ChaCha8Rng) -> Op {
    let total: f64 = items.iter().map(|(_, weight)| weight.max(0.0)).sum();
    if total <= f64::EPSILON {
        return items
            .first()
            .map_or(Op::Sleep(1), |(op, _)| op.clone());
    }
    let mut target = rng.random::<f64>() * total;
    for (op, weight) in items {
        let w = weight.max(0.0);
        if target <= w {
            return op.clone();
        }
        target -= w;
    }
    items.last().map_or(Op::Sleep(1), |(op, _)| op.clone())
}

fn format_op(op: &Op) -> String {
    match op {
        Op::Sleep(ms) => format!("Sleep({ms}ms)"),
        Op::Intrude(Foreign::Transaction(_)) => "Intrude(txn)".to_string(),
        Op::Intrude(Foreign::Statement(_)) => "Intrude(stmt)".to_string(),
        Op::Intrude(Foreign::Cursor(_)) => "Intrude(cursor)".to_string(),
        other => format!("{other:?}"),
    }
}
