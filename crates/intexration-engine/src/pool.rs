//! Bounded fan-out over scoped threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Run `job` over every item on at most `max_workers` threads and wait for all of them.
///
/// Workers pull the next unclaimed item until none remain, so one slow item does
/// not hold back a whole chunk. Results come back in input order. A panicking job
/// is re-raised on the calling thread after every worker has stopped.
pub fn run_bounded<T, R, F>(items: &[T], max_workers: usize, job: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let workers = max_workers.max(1).min(items.len());
    if workers <= 1 {
        return items.iter().map(&job).collect();
    }

    let next = AtomicUsize::new(0);
    let job = &job;
    let next = &next;

    let joined: Vec<thread::Result<Vec<(usize, R)>>> = thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                thread::Builder::new()
                    .name(format!("intexration-build-{worker}"))
                    .spawn_scoped(s, move || {
                        let mut done = Vec::new();
                        loop {
                            let index = next.fetch_add(1, Ordering::Relaxed);
                            let Some(item) = items.get(index) else {
                                break;
                            };
                            done.push((index, job(item)));
                        }
                        done
                    })
            })
            .collect();

        handles
            .into_iter()
            .map(|spawned| match spawned {
                Ok(handle) => handle.join(),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to spawn build worker");
                    Ok(Vec::new())
                }
            })
            .collect()
    });

    let mut results: Vec<(usize, R)> = Vec::with_capacity(items.len());
    let mut panic = None;
    for outcome in joined {
        match outcome {
            Ok(done) => results.extend(done),
            Err(payload) => panic = Some(payload),
        }
    }
    if let Some(payload) = panic {
        std::panic::resume_unwind(payload);
    }

    // Items no worker reached (only when spawning failed) run here.
    let mut claimed = vec![false; items.len()];
    for (index, _) in &results {
        claimed[*index] = true;
    }
    for (index, item) in items.iter().enumerate() {
        if !claimed[index] {
            results.push((index, job(item)));
        }
    }

    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, r)| r).collect()
}
