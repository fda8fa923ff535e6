//! Time base and fusion cycle dispatcher
//!
//! A periodic timer interrupt calls [`Ticker::on_tick`] at `tick_rate`. Every
//! tick advances the time base; every `divider`-th tick also runs the fusion
//! cycle and measures how long it took with a free-running cycle counter.
//!
//! The fusion cycle must finish within two tick intervals or timer interrupts
//! are lost. Overruns are counted, never logged, since logging from the
//! interrupt would make them worse.

use core::cell::Cell;

use critical_section::Mutex;

use crate::error::Error;
use crate::log_info;
use crate::types::AhrsSettings;

/// Tick intervals a fusion cycle may take before interrupts are lost
pub const BUDGET_TICKS: u32 = 2;

/// Free-running hardware cycle counter used to time the fusion cycle
pub trait CycleCounter {
    /// Current count; wraps at `u32::MAX`
    fn now(&self) -> u32;

    /// Counter frequency, in Hz
    fn counts_per_second(&self) -> f32;
}

/// Tick counter and fusion cycle dispatcher
pub struct Ticker<C> {
    ticks: Mutex<Cell<u32>>,
    duration: Mutex<Cell<u32>>,
    overruns: Mutex<Cell<u32>>,
    tick_rate: u32,
    mask: u32,
    budget_counts: u32,
    counter: C,
}

impl<C: CycleCounter> Ticker<C> {
    /// Create a ticker for the given tick and dispatch rates
    ///
    /// Fails unless the tick rate is a power-of-two multiple of the dispatch rate.
    pub fn new(settings: &AhrsSettings, counter: C) -> Result<Self, Error> {
        let divider = settings.divider()?;
        let cps = counter.counts_per_second();
        let budget_counts = (BUDGET_TICKS as f32 * cps / settings.tick_rate as f32) as u32;

        log_info!(
            "ticker: {} Hz, dispatch {} Hz (1/{}), budget {} ms",
            settings.tick_rate,
            settings.dispatch_rate,
            divider,
            BUDGET_TICKS as f32 * 1000.0 / settings.tick_rate as f32
        );

        Ok(Self {
            ticks: Mutex::new(Cell::new(0)),
            duration: Mutex::new(Cell::new(0)),
            overruns: Mutex::new(Cell::new(0)),
            tick_rate: settings.tick_rate,
            mask: divider - 1,
            budget_counts,
            counter,
        })
    }

    /// Timer interrupt body
    ///
    /// Advances the time base and, on dispatch ticks, runs `cycle` and returns
    /// its duration in counter counts.
    pub fn on_tick<F: FnOnce()>(&self, cycle: F) -> Option<u32> {
        let ticks = critical_section::with(|cs| {
            let ticks = self.ticks.borrow(cs);
            let next = ticks.get().wrapping_add(1);
            ticks.set(next);
            next
        });

        if ticks & self.mask != 0 {
            return None;
        }

        let start = self.counter.now();
        cycle();
        let elapsed = self.counter.now().wrapping_sub(start);

        critical_section::with(|cs| {
            self.duration.borrow(cs).set(elapsed);
            if elapsed > self.budget_counts {
                let overruns = self.overruns.borrow(cs);
                overruns.set(overruns.get().saturating_add(1));
            }
        });
        Some(elapsed)
    }

    /// Ticks since start; wraps
    pub fn now(&self) -> u32 {
        critical_section::with(|cs| self.ticks.borrow(cs).get())
    }

    /// Seconds elapsed since `start`, a value previously returned by [`Ticker::now`]
    pub fn elapsed(&self, start: u32) -> f32 {
        self.now().wrapping_sub(start) as f32 / self.tick_rate as f32
    }

    /// Busy-wait for `seconds`
    ///
    /// Only returns if the timer interrupt keeps ticking.
    pub fn pause(&self, seconds: f32) {
        let start = self.now();
        while self.elapsed(start) < seconds {
            core::hint::spin_loop();
        }
    }

    /// Duration of the last fusion cycle, in counter counts
    pub fn duration(&self) -> u32 {
        critical_section::with(|cs| self.duration.borrow(cs).get())
    }

    /// Duration of the last fusion cycle, in milliseconds
    pub fn duration_ms(&self) -> f32 {
        self.counts_to_ms(self.duration())
    }

    /// Fusion cycles that ran past the budget
    pub fn overruns(&self) -> u32 {
        critical_section::with(|cs| self.overruns.borrow(cs).get())
    }

    /// Longest allowed fusion cycle, in counter counts
    pub fn budget_counts(&self) -> u32 {
        self.budget_counts
    }

    /// Convert counter counts to milliseconds
    pub fn counts_to_ms(&self, counts: u32) -> f32 {
        counts as f32 * 1000.0 / self.counter.counts_per_second()
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    /// Ticks per fusion cycle
    pub fn divider(&self) -> u32 {
        self.mask + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    /// 16 MHz / 1024 counter, advanced by hand
    struct FakeCounter {
        count: AtomicU32,
        step: u32,
    }

    impl FakeCounter {
        fn new(step: u32) -> Self {
            Self {
                count: AtomicU32::new(0),
                step,
            }
        }
    }

    impl CycleCounter for FakeCounter {
        fn now(&self) -> u32 {
            // each read advances by `step`, so a cycle measures exactly `step`
            self.count.fetch_add(self.step, Ordering::Relaxed)
        }

        fn counts_per_second(&self) -> f32 {
            16_000_000.0 / 1024.0
        }
    }

    #[test]
    fn test_rejects_bad_divider() {
        let settings = AhrsSettings {
            dispatch_rate: 300,
            ..Default::default()
        };
        assert!(Ticker::new(&settings, FakeCounter::new(1)).is_err());
    }

    #[test]
    fn test_dispatches_every_fourth_tick() {
        let ticker = Ticker::new(&AhrsSettings::default(), FakeCounter::new(5)).unwrap();
        let mut cycles = 0;
        let mut dispatched_on = [0u32; 3];

        for tick in 1..=12 {
            if ticker.on_tick(|| cycles += 1).is_some() {
                dispatched_on[cycles - 1] = tick;
            }
        }

        assert_eq!(cycles, 3);
        assert_eq!(dispatched_on, [4, 8, 12]);
        assert_eq!(ticker.now(), 12);
        assert_eq!(ticker.duration(), 5);
    }

    #[test]
    fn test_budget() {
        let ticker = Ticker::new(&AhrsSettings::default(), FakeCounter::new(1)).unwrap();
        // two 1 ms ticks at 15625 counts per second
        assert_eq!(ticker.budget_counts(), 31);
        assert!((ticker.counts_to_ms(ticker.budget_counts()) - 1.984).abs() < 1e-3);
    }

    #[test]
    fn test_overrun_counted() {
        let ticker = Ticker::new(&AhrsSettings::default(), FakeCounter::new(40)).unwrap();
        for _ in 0..8 {
            ticker.on_tick(|| {});
        }
        assert_eq!(ticker.overruns(), 2);
        assert!(ticker.duration_ms() > 2.0);
    }

    #[test]
    fn test_elapsed_wraps() {
        let ticker = Ticker::new(&AhrsSettings::default(), FakeCounter::new(1)).unwrap();
        for _ in 0..10 {
            ticker.on_tick(|| {});
        }
        let start = u32::MAX - 9; // ten ticks before the counter wrapped to 0
        assert!((ticker.elapsed(start) - 0.020).abs() < 1e-6);
    }

    #[test]
    fn test_pause_waits_for_ticks() {
        let ticker = Arc::new(Ticker::new(&AhrsSettings::default(), FakeCounter::new(1)).unwrap());
        let stop = Arc::new(AtomicBool::new(false));

        let timer = {
            let ticker = Arc::clone(&ticker);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    ticker.on_tick(|| {});
                    thread::sleep(Duration::from_micros(100));
                }
            })
        };

        let start = ticker.now();
        ticker.pause(0.050);
        let waited = ticker.now().wrapping_sub(start);

        stop.store(true, Ordering::Relaxed);
        timer.join().unwrap();

        assert!(waited >= 50, "waited {waited} ticks");
    }
}
