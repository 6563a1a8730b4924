//! Named-job scheduler.
//!
//! A `Task` is an ordered list of named jobs that can be switched on and
//! off; running the task runs every enabled job with the same arguments.
//! `JobSystem` groups tasks by name. Both are plain values owned by the
//! caller.

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use tracing::trace;
use vigil_core::{Error, Result};

/// A job receiving the task's arguments.
pub type Job<A> = Box<dyn FnMut(&A)>;

struct Entry<A> {
    name: String,
    job: Job<A>,
    enabled: bool,
}

/// Ordered set of named jobs.
pub struct Task<A> {
    name: String,
    jobs: Vec<Entry<A>>,
}

impl<A> Task<A> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            jobs: Vec::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a job. Job names are unique within a task.
    pub fn add_job<F>(&mut self, name: impl Into<String>, job: F, enabled: bool) -> Result<()>
    where
        F: FnMut(&A) + 'static,
    {
        let name = name.into();
        if self.position(&name).is_some() {
            return Err(Error::invalid_operation(format!(
                "job {} already exists in task {}",
                name, self.name
            )));
        }
        self.jobs.push(Entry {
            name,
            job: Box::new(job),
            enabled,
        });
        Ok(())
    }

    /// Removes a job. Returns true if it existed.
    pub fn remove_job(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(index) => {
                self.jobs.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn enable(&mut self, name: &str) -> Result<()> {
        self.entry_mut(name)?.enabled = true;
        Ok(())
    }

    pub fn disable(&mut self, name: &str) -> Result<()> {
        self.entry_mut(name)?.enabled = false;
        Ok(())
    }

    /// Flips a job and returns its new state.
    pub fn toggle(&mut self, name: &str) -> Result<bool> {
        let entry = self.entry_mut(name)?;
        entry.enabled = !entry.enabled;
        Ok(entry.enabled)
    }

    /// Returns whether a job is enabled, or None if there is no such job.
    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.position(name).map(|index| self.jobs[index].enabled)
    }

    /// Runs the enabled jobs in insertion order. Returns how many ran.
    pub fn run(&mut self, args: &A) -> usize {
        let mut ran = 0;
        for entry in self.jobs.iter_mut().filter(|entry| entry.enabled) {
            trace!(task = %self.name, job = %entry.name, "running job");
            (entry.job)(args);
            ran += 1;
        }
        ran
    }

    /// Returns the job names in insertion order.
    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(|entry| entry.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.jobs.iter().position(|entry| entry.name == name)
    }

    fn entry_mut(&mut self, name: &str) -> Result<&mut Entry<A>> {
        match self.position(name) {
            Some(index) => Ok(&mut self.jobs[index]),
            None => Err(Error::invalid_operation(format!(
                "no job {} in task {}",
                name, self.name
            ))),
        }
    }
}

/// Tasks addressed by name.
pub struct JobSystem<A> {
    tasks: Vec<Task<A>>,
}

impl<A> Default for JobSystem<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> JobSystem<A> {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Returns the task with this name, creating it if needed.
    pub fn task(&mut self, name: &str) -> &mut Task<A> {
        let index = match self.tasks.iter().position(|task| task.name == name) {
            Some(index) => index,
            None => {
                self.tasks.push(Task::new(name));
                self.tasks.len() - 1
            }
        };
        &mut self.tasks[index]
    }

    /// Returns an existing task.
    pub fn get(&self, name: &str) -> Option<&Task<A>> {
        self.tasks.iter().find(|task| task.name == name)
    }

    /// Removes a task. Returns true if it existed.
    pub fn remove_task(&mut self, name: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.name != name);
        self.tasks.len() != before
    }

    /// Runs a task by name. Returns how many jobs ran.
    pub fn run(&mut self, name: &str, args: &A) -> Result<usize> {
        self.tasks
            .iter_mut()
            .find(|task| task.name == name)
            .map(|task| task.run(args))
            .ok_or_else(|| Error::invalid_operation(format!("no task {}", name)))
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|task| task.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::RefCell;

    #[test]
    fn test_run_enabled_jobs_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut task: Task<u32> = Task::new("frame");
        for (name, enabled) in [("physics", true), ("debug", false), ("render", true)] {
            let log = log.clone();
            task.add_job(name, move |dt: &u32| log.borrow_mut().push((name, *dt)), enabled)
                .unwrap();
        }

        assert_eq!(task.run(&16), 2);
        assert_eq!(*log.borrow(), vec![("physics", 16), ("render", 16)]);
    }

    #[test]
    fn test_toggle() {
        let mut task: Task<()> = Task::new("t");
        task.add_job("a", |_: &()| {}, false).unwrap();
        assert_eq!(task.toggle("a"), Ok(true));
        assert_eq!(task.is_enabled("a"), Some(true));
        task.disable("a").unwrap();
        assert_eq!(task.is_enabled("a"), Some(false));
        task.enable("a").unwrap();
        assert_eq!(task.run(&()), 1);
        assert!(task.toggle("missing").is_err());
        assert_eq!(task.is_enabled("missing"), None);
    }

    #[test]
    fn test_duplicate_job_rejected() {
        let mut task: Task<()> = Task::new("t");
        task.add_job("a", |_: &()| {}, true).unwrap();
        assert!(task.add_job("a", |_: &()| {}, true).is_err());
        assert!(task.remove_job("a"));
        assert!(task.is_empty());
    }

    #[test]
    fn test_job_system() {
        let count = Rc::new(RefCell::new(0));
        let mut jobs: JobSystem<i32> = JobSystem::new();
        let c = count.clone();
        jobs.task("update")
            .add_job("sum", move |n: &i32| *c.borrow_mut() += *n, true)
            .unwrap();

        assert_eq!(jobs.run("update", &5), Ok(1));
        assert_eq!(*count.borrow(), 5);
        assert!(jobs.run("missing", &1).is_err());
        assert_eq!(jobs.task_names(), vec!["update"]);
        assert!(jobs.remove_task("update"));
        assert!(jobs.get("update").is_none());
    }
}
