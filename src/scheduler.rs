//! Round-robin scheduling over the real machine's active processes.
//!
//! A round visits the processes in insertion order and gives each unfinished
//! one a turn of at most `quantum` instructions. The order is snapshotted as
//! process handles when the round starts; a process that crashes is skipped
//! from then on without shifting anyone else's turn.

use log::{debug, info};

use crate::machine::{RealMachine, StepOutcome};
use crate::process::{FaultReport, Process, ProcessHandle};

/// What happened during one scheduling round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundReport {
    /// Instructions each serviced process completed, in service order
    pub turns: Vec<(ProcessHandle, usize)>,
    pub faults: Vec<FaultReport>,
}

impl RoundReport {
    pub fn instructions(&self) -> usize {
        self.turns.iter().map(|&(_, n)| n).sum()
    }
}

/// Totals over a full run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub rounds: usize,
    pub instructions: usize,
    pub faults: Vec<FaultReport>,
}

impl<P: Process> RealMachine<P> {
    /// Give every unfinished process one turn
    pub fn run_one_round(&mut self) -> RoundReport {
        let order: Vec<ProcessHandle> = self.processes.iter().map(|slot| slot.handle).collect();
        let mut report = RoundReport::default();

        for handle in order {
            if !self.is_unfinished(handle) {
                continue;
            }
            self.timer = self.config.quantum;
            let mut executed = 0;
            while self.timer > 0 && self.is_unfinished(handle) {
                match self.execute(handle) {
                    Some(StepOutcome::Executed) => executed += 1,
                    Some(StepOutcome::Faulted(fault)) => {
                        report.faults.push(fault);
                        break;
                    }
                    None => break,
                }
                self.timer -= 1;
            }
            debug!("turn of {}: {} instructions", handle, executed);
            report.turns.push((handle, executed));
        }
        report
    }

    /// Run rounds until every remaining process has finished.
    ///
    /// Does not return while some process never finishes.
    pub fn run_to_completion(&mut self) -> RunReport {
        let mut run = RunReport::default();
        while self.has_unfinished() {
            let round = self.run_one_round();
            run.rounds += 1;
            run.instructions += round.instructions();
            run.faults.extend(round.faults);
        }
        info!(
            "run complete: {} rounds, {} instructions, {} faults",
            run.rounds,
            run.instructions,
            run.faults.len()
        );
        run
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::config::MachineConfig;
    use crate::error::{FaultKind, Result};
    use crate::memory::PhysicalMemory;
    use crate::page_table::PageTable;
    use crate::process::ProcessIdentity;
    use crate::word::Word;

    type Trace = Rc<RefCell<Vec<String>>>;

    /// Appends its name to a shared trace on every instruction
    struct Scripted {
        identity: ProcessIdentity,
        table: PageTable,
        trace: Trace,
        executed: usize,
        /// Never finishes when `None`
        limit: Option<usize>,
        /// Fails on its n-th instruction (1-based)
        crash_on: Option<usize>,
    }

    impl Process for Scripted {
        fn identity(&self) -> ProcessIdentity {
            self.identity.clone()
        }

        fn is_finished(&self) -> bool {
            self.limit.is_some_and(|limit| self.executed >= limit)
        }

        fn execute_one_instruction(&mut self, memory: &mut PhysicalMemory) -> anyhow::Result<()> {
            if self.crash_on == Some(self.executed + 1) {
                return Err(anyhow::anyhow!("contract violation"));
            }
            self.table
                .write(memory, self.executed % 8, Word::from_text(&self.identity.name)?)?;
            self.trace.borrow_mut().push(self.identity.name.clone());
            self.executed += 1;
            Ok(())
        }

        fn release_resources(&mut self, memory: &mut PhysicalMemory) -> Result<()> {
            self.table.deallocate_all(memory)
        }

        fn fork(&self, memory: &mut PhysicalMemory) -> Result<Self> {
            Ok(Scripted {
                identity: self.identity.clone(),
                table: self.table.duplicate(memory)?,
                trace: Rc::clone(&self.trace),
                executed: self.executed,
                limit: self.limit,
                crash_on: self.crash_on,
            })
        }
    }

    fn machine(frame_count: usize) -> RealMachine<Scripted> {
        RealMachine::new(MachineConfig {
            page_size: 4,
            frame_count,
            virtual_page_count: 4,
            quantum: 5,
            seed: Some(11),
        })
        .unwrap()
    }

    fn spawn(
        machine: &mut RealMachine<Scripted>,
        trace: &Trace,
        name: &str,
        limit: Option<usize>,
        crash_on: Option<usize>,
    ) -> ProcessHandle {
        let trace = Rc::clone(trace);
        let identity = ProcessIdentity::new(name, machine.process_count() as u32);
        machine
            .spawn(move |memory| {
                Ok(Scripted {
                    identity,
                    table: PageTable::new(memory),
                    trace,
                    executed: 0,
                    limit,
                    crash_on,
                })
            })
            .unwrap()
    }

    fn names(trace: &Trace) -> Vec<String> {
        trace.borrow().clone()
    }

    fn repeat(name: &str, n: usize) -> Vec<String> {
        vec![name.to_string(); n]
    }

    #[test]
    fn test_round_robin_fairness() {
        let mut machine = machine(16);
        let trace = Trace::default();
        let a = spawn(&mut machine, &trace, "A", None, None);
        let b = spawn(&mut machine, &trace, "B", None, None);
        let c = spawn(&mut machine, &trace, "C", None, None);

        let report = machine.run_one_round();

        let expected = [repeat("A", 5), repeat("B", 5), repeat("C", 5)].concat();
        assert_eq!(names(&trace), expected);
        assert_eq!(report.turns, vec![(a, 5), (b, 5), (c, 5)]);
        assert_eq!(report.instructions(), 15);
        assert!(report.faults.is_empty());
    }

    #[test]
    fn test_quantum_reset_every_turn() {
        let mut machine = machine(16);
        let trace = Trace::default();
        spawn(&mut machine, &trace, "A", None, None);
        spawn(&mut machine, &trace, "B", None, None);

        machine.run_one_round();
        machine.run_one_round();

        let expected = [repeat("A", 5), repeat("B", 5), repeat("A", 5), repeat("B", 5)].concat();
        assert_eq!(names(&trace), expected);
        assert_eq!(machine.timer(), 0);
    }

    #[test]
    fn test_finishing_mid_turn_ends_turn() {
        let mut machine = machine(16);
        let trace = Trace::default();
        let a = spawn(&mut machine, &trace, "A", Some(3), None);
        let b = spawn(&mut machine, &trace, "B", None, None);

        let report = machine.run_one_round();
        assert_eq!(report.turns, vec![(a, 3), (b, 5)]);

        // Finished processes stay in the set but get no further turns
        let report = machine.run_one_round();
        assert_eq!(report.turns, vec![(b, 5)]);
        assert_eq!(machine.process_count(), 2);
    }

    #[test]
    fn test_crash_isolation() {
        let mut machine = machine(16);
        let trace = Trace::default();
        let a = spawn(&mut machine, &trace, "A", None, None);
        let b = spawn(&mut machine, &trace, "B", None, Some(3));
        let c = spawn(&mut machine, &trace, "C", None, None);

        let report = machine.run_one_round();

        // B ran two instructions, crashed on its third, and C still got a full turn
        let expected = [repeat("A", 5), repeat("B", 2), repeat("C", 5)].concat();
        assert_eq!(names(&trace), expected);
        assert_eq!(report.turns, vec![(a, 5), (b, 2), (c, 5)]);
        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].handle, b);
        assert_eq!(report.faults[0].process.name, "B");
        assert_eq!(report.faults[0].kind, FaultKind::Program);

        let remaining: Vec<ProcessHandle> = machine.processes().map(|(h, _)| h).collect();
        assert_eq!(remaining, vec![a, c]);

        // Next round skips nobody
        trace.borrow_mut().clear();
        machine.run_one_round();
        assert_eq!(names(&trace), [repeat("A", 5), repeat("C", 5)].concat());
    }

    #[test]
    fn test_crashed_frames_return_to_pool() {
        // A and C each hold 2 frames, B held 1 before crashing
        let mut machine = machine(5);
        let trace = Trace::default();
        spawn(&mut machine, &trace, "A", None, None);
        spawn(&mut machine, &trace, "B", None, Some(3));
        spawn(&mut machine, &trace, "C", None, None);

        machine.run_one_round();
        assert_eq!(machine.allocated_frame_count(), 4);
        assert_eq!(machine.free_frame_count(), 1);

        // The freed frame can be claimed by a newcomer
        let d = spawn(&mut machine, &trace, "D", None, None);
        assert_eq!(machine.execute(d), Some(StepOutcome::Executed));
        assert_eq!(machine.free_frame_count(), 0);
    }

    #[test]
    fn test_first_process_crash_does_not_skip_next() {
        let mut machine = machine(16);
        let trace = Trace::default();
        spawn(&mut machine, &trace, "A", None, Some(1));
        let b = spawn(&mut machine, &trace, "B", None, None);

        let report = machine.run_one_round();
        assert_eq!(names(&trace), repeat("B", 5));
        assert_eq!(report.turns.last(), Some(&(b, 5)));
    }

    #[test]
    fn test_run_to_completion() {
        let mut machine = machine(16);
        let trace = Trace::default();
        spawn(&mut machine, &trace, "A", Some(7), None);
        spawn(&mut machine, &trace, "B", Some(12), Some(9));
        spawn(&mut machine, &trace, "C", Some(2), None);

        let run = machine.run_to_completion();

        // A: 5+2, B: 5+3 then crash, C: 2
        assert_eq!(run.rounds, 2);
        assert_eq!(run.instructions, 17);
        assert_eq!(run.faults.len(), 1);
        assert!(!machine.has_unfinished());
        assert_eq!(machine.process_count(), 2);
    }

    #[test]
    fn test_run_to_completion_with_no_processes() {
        let mut machine = machine(4);
        let run = machine.run_to_completion();
        assert_eq!(run, RunReport::default());
    }

    #[test]
    fn test_forked_child_is_scheduled_after_parent() {
        let mut machine = machine(16);
        let trace = Trace::default();
        let a = spawn(&mut machine, &trace, "A", Some(5), None);
        let b = spawn(&mut machine, &trace, "B", Some(5), None);
        machine.execute(a);

        let child = machine.fork(a).unwrap();
        let report = machine.run_one_round();

        // The child resumes from the parent's progress
        assert_eq!(report.turns, vec![(a, 4), (b, 5), (child, 4)]);
    }
}
