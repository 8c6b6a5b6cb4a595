//! Fixed-size worker pool for per-file work within one bundle.
//!
//! Indices flow through a bounded channel to a fixed set of scoped
//! threads. Each worker accumulates its own results and the pool merges
//! them after all workers finish, so no result slot is ever written
//! from two threads. The first error raises a shared flag that stops
//! the dispatcher; in-flight work is allowed to finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::bounded;

use crate::error::{Error, Result};

/// Run `work` over `indexes` on `workers` threads, collecting one
/// result per index (in no particular order). Returns the first error
/// any worker hit, after all workers have stopped.
pub fn run<T, F>(workers: usize, indexes: &[usize], work: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize) -> Result<T> + Sync,
{
    let workers = workers.max(1);
    let failed = AtomicBool::new(false);
    let (tx, rx) = bounded::<usize>(workers);

    let mut results: Vec<T> = Vec::with_capacity(indexes.len());
    let mut first_err: Option<Error> = None;

    thread::scope(|s| {
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let rx = rx.clone();
            let failed = &failed;
            let work = &work;
            handles.push(s.spawn(move || {
                let mut out: Vec<T> = Vec::new();
                let mut err: Option<Error> = None;
                for index in rx.iter() {
                    match work(index) {
                        Ok(v) => out.push(v),
                        Err(e) => {
                            failed.store(true, Ordering::SeqCst);
                            err = Some(e);
                            break;
                        }
                    }
                }
                (out, err)
            }));
        }
        drop(rx);

        // dispatch until done or a worker failed
        for &index in indexes {
            if failed.load(Ordering::SeqCst) {
                break;
            }
            if tx.send(index).is_err() {
                break;
            }
        }
        drop(tx);

        for handle in handles {
            match handle.join() {
                Ok((out, err)) => {
                    results.extend(out);
                    if first_err.is_none() {
                        first_err = err;
                    }
                }
                Err(_) => {
                    if first_err.is_none() {
                        first_err = Some(Error::worker("worker thread panicked"));
                    }
                }
            }
        }
    });

    match first_err {
        Some(e) => Err(e),
        None => Ok(results),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_all_results() {
        let indexes: Vec<usize> = (0..20).collect();
        let mut results = run(4, &indexes, |i| Ok(i * 2)).unwrap();
        results.sort();

        let expected: Vec<usize> = (0..20).map(|i| i * 2).collect();
        assert_eq!(results, expected);
    }

    #[test]
    fn test_single_worker_preserves_order() {
        let indexes: Vec<usize> = (0..5).collect();
        let results = run(1, &indexes, |i| Ok(i)).unwrap();
        assert_eq!(results, indexes);
    }

    #[test]
    fn test_first_error_propagates() {
        let indexes: Vec<usize> = (0..100).collect();
        let result: Result<Vec<usize>> = run(4, &indexes, |i| {
            if i == 7 {
                Err(Error::worker("boom"))
            } else {
                Ok(i)
            }
        });

        assert!(result.is_err());
    }

    #[test]
    fn test_panicking_worker_reported() {
        let indexes: Vec<usize> = (0..4).collect();
        let result: Result<Vec<usize>> = run(2, &indexes, |i| {
            if i == 2 {
                panic!("worker exploded");
            }
            Ok(i)
        });

        assert!(matches!(result, Err(Error::Worker(_))));
    }
}
