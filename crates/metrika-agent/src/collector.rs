//! Metric collectors run by the agent's poller.
//!
//! A collector returns gauges (current values) and counters (deltas to add
//! since the previous poll). The poller applies them to the agent's store.

use anyhow::Result;
use metrika_core::Metric;
use sysinfo::{Pid, ProcessesToUpdate, System};

/// A source of metrics sampled on every poll.
pub trait Collector: Send {
    /// Collector name, used for logging.
    fn name(&self) -> &str;

    /// Sample current values. Counter records carry deltas.
    fn collect(&mut self) -> Result<Vec<Metric>>;
}

/// Agent process metrics: poll count, a random gauge, and the agent's own
/// memory and CPU use.
pub struct RuntimeCollector {
    system: System,
    pid: Option<Pid>,
}

impl RuntimeCollector {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl Default for RuntimeCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for RuntimeCollector {
    fn name(&self) -> &str {
        "runtime"
    }

    fn collect(&mut self) -> Result<Vec<Metric>> {
        let mut metrics = vec![
            Metric::counter("PollCount", 1),
            Metric::gauge("RandomValue", rand::random::<f64>()),
        ];

        if let Some(pid) = self.pid {
            self.system
                .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            if let Some(process) = self.system.process(pid) {
                metrics.push(Metric::gauge(
                    "ProcessResidentMemory",
                    process.memory() as f64,
                ));
                metrics.push(Metric::gauge(
                    "ProcessVirtualMemory",
                    process.virtual_memory() as f64,
                ));
                metrics.push(Metric::gauge(
                    "ProcessCpuUsage",
                    process.cpu_usage() as f64,
                ));
            }
        }

        Ok(metrics)
    }
}

/// Host memory and per-core CPU utilisation.
pub struct SystemCollector {
    system: System,
}

impl SystemCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        Self { system }
    }
}

impl Default for SystemCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for SystemCollector {
    fn name(&self) -> &str {
        "system"
    }

    fn collect(&mut self) -> Result<Vec<Metric>> {
        self.system.refresh_memory();
        self.system.refresh_cpu_all();

        let mut metrics = vec![
            Metric::gauge("TotalMemory", self.system.total_memory() as f64),
            Metric::gauge("FreeMemory", self.system.free_memory() as f64),
        ];
        for (i, cpu) in self.system.cpus().iter().enumerate() {
            metrics.push(Metric::gauge(
                format!("CPUutilization{}", i + 1),
                cpu.cpu_usage() as f64,
            ));
        }

        Ok(metrics)
    }
}
