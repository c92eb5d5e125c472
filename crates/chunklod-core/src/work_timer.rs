use std::convert::TryInto;
use std::time::Duration;

/// Accumulates the CPU time spent on a sequence of work items, like meshing and writing chunks.
pub struct WorkTimer {
    total_cpu_time: Duration,
    slowest_item: Duration,
    items_completed: u32,
}

impl WorkTimer {
    pub fn start() -> Self {
        Self {
            total_cpu_time: Duration::new(0, 0),
            slowest_item: Duration::new(0, 0),
            items_completed: 0,
        }
    }

    pub fn total_cpu_time(&self) -> Duration {
        self.total_cpu_time
    }

    pub fn slowest_item(&self) -> Duration {
        self.slowest_item
    }

    pub fn items_completed(&self) -> u32 {
        self.items_completed
    }

    pub fn complete_item(&mut self, d: Duration) {
        self.total_cpu_time += d;
        self.slowest_item = self.slowest_item.max(d);
        self.items_completed += 1;
    }

    pub fn average_cpu_time_us(&self) -> u32 {
        let total_cpu_time_us: u32 = self
            .total_cpu_time
            .as_micros()
            .try_into()
            .unwrap_or(u32::MAX);

        total_cpu_time_us / self.items_completed.max(1)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn average_of_completed_items() {
        let mut timer = WorkTimer::start();
        assert_eq!(timer.average_cpu_time_us(), 0);

        timer.complete_item(Duration::from_micros(100));
        timer.complete_item(Duration::from_micros(300));
        assert_eq!(timer.items_completed(), 2);
        assert_eq!(timer.average_cpu_time_us(), 200);
        assert_eq!(timer.slowest_item(), Duration::from_micros(300));
    }
}
