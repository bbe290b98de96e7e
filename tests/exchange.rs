use std::sync::Arc;

use tessella::{Error, TerminationState};

#[test]
fn detector_stops_on_the_first_silent_round() {
    let term = Arc::new(TerminationState::new(3));
    // Per-process received counts for two rounds: the second is silent.
    let schedules: Vec<Vec<u64>> = vec![vec![5, 0], vec![0, 0], vec![2, 0]];
    let mut handles = Vec::new();
    for schedule in schedules {
        let term = Arc::clone(&term);
        handles.push(std::thread::spawn(move || {
            let mut rounds = 0;
            while term.enter_round() {
                let received = schedule[rounds];
                rounds += 1;
                term.vote_and_wait(received).unwrap();
            }
            rounds
        }));
    }
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 2);
    }
    assert!(term.finished());
    assert_eq!(term.rounds_log(), vec![7, 0]);
}

#[test]
fn abort_wakes_a_blocked_voter() {
    let term = Arc::new(TerminationState::new(2));
    let waiter = {
        let term = Arc::clone(&term);
        std::thread::spawn(move || term.vote_and_wait(1))
    };
    // Give the voter time to block, then poison the state.
    std::thread::sleep(std::time::Duration::from_millis(50));
    term.abort();
    let result = waiter.join().unwrap();
    assert!(matches!(result, Err(Error::Aborted)));
    assert!(!term.finished());
}

#[test]
fn barrier_requires_everyone() {
    let term = Arc::new(TerminationState::new(2));
    let other = {
        let term = Arc::clone(&term);
        std::thread::spawn(move || term.barrier())
    };
    term.barrier().unwrap();
    other.join().unwrap().unwrap();
}
