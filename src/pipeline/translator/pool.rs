use crossbeam_channel as cb;

/// Runs `job` for every index and returns `(index, result)` sorted by index.
///
/// With `workers <= 1` jobs run inline in index order. Otherwise up to `workers`
/// scoped threads pull indices from a shared queue; completion order does not
/// matter because results are sorted before returning.
pub(super) fn fan_out<T, F>(indices: &[usize], workers: usize, job: F) -> Vec<(usize, T)>
where
    T: Send,
    F: Fn(usize) -> T + Sync,
{
    if workers <= 1 || indices.len() <= 1 {
        return indices.iter().map(|&i| (i, job(i))).collect();
    }

    let (job_tx, job_rx) = cb::bounded::<usize>(indices.len());
    for &i in indices {
        // Capacity equals the job count, so this never blocks.
        let _ = job_tx.send(i);
    }
    drop(job_tx);

    let (res_tx, res_rx) = cb::unbounded::<(usize, T)>();
    let job = &job;
    std::thread::scope(|scope| {
        for _ in 0..workers.min(indices.len()) {
            let job_rx = job_rx.clone();
            let res_tx = res_tx.clone();
            scope.spawn(move || {
                for i in job_rx.iter() {
                    if res_tx.send((i, job(i))).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(res_tx);

    let mut out: Vec<(usize, T)> = res_rx.iter().collect();
    out.sort_by_key(|(i, _)| *i);
    out
}

#[cfg(test)]
mod tests {
    use super::fan_out;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn sequential_runs_in_index_order() {
        let calls = std::sync::Mutex::new(Vec::new());
        let out = fan_out(&[0, 2, 5], 1, |i| {
            calls.lock().unwrap().push(i);
            i * 10
        });
        assert_eq!(out, vec![(0, 0), (2, 20), (5, 50)]);
        assert_eq!(*calls.lock().unwrap(), vec![0, 2, 5]);
    }

    #[test]
    fn parallel_results_are_index_ordered() {
        let indices: Vec<usize> = (0..16).collect();
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let out = fan_out(&indices, 4, |i| {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            // Later indices finish first.
            std::thread::sleep(Duration::from_millis((16 - i as u64) * 2));
            running.fetch_sub(1, Ordering::SeqCst);
            format!("r{i}")
        });
        let got: Vec<usize> = out.iter().map(|(i, _)| *i).collect();
        assert_eq!(got, indices);
        assert_eq!(out[3].1, "r3");
        assert!(peak.load(Ordering::SeqCst) <= 4);
    }
}
