// Automatable value: a handful of scheduled events, read back per frame.
// Times are absolute device frames.

const MAX_EVENTS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Event {
    Set { time: u64, value: f32 },
    ExpRamp { time: u64, value: f32 },
}

#[derive(Clone, Debug)]
pub struct Param {
    initial: f32,
    events: [Option<Event>; MAX_EVENTS],
    len: usize,
}

impl Param {
    pub fn new(initial: f32) -> Self {
        Self {
            initial,
            events: [None; MAX_EVENTS],
            len: 0,
        }
    }

    // events must be pushed in time order; extras past MAX_EVENTS are dropped
    fn push(&mut self, event: Event) {
        debug_assert!(self.len < MAX_EVENTS, "param automation full");
        if self.len < MAX_EVENTS {
            self.events[self.len] = Some(event);
            self.len += 1;
        }
    }

    pub fn set_value_at_time(&mut self, value: f32, time: u64) {
        self.push(Event::Set { time, value });
    }

    /// Exponential glide from the previous event's value to `value`,
    /// arriving at `time`. Both ends must be positive.
    pub fn exponential_ramp_to_value_at_time(&mut self, value: f32, time: u64) {
        self.push(Event::ExpRamp { time, value });
    }

    pub fn value_at(&self, t: u64) -> f32 {
        let mut prev_value = self.initial;
        let mut prev_time = 0u64;
        for event in self.events[..self.len].iter().flatten() {
            match *event {
                Event::Set { time, value } => {
                    if t < time {
                        return prev_value;
                    }
                    prev_value = value;
                    prev_time = time;
                }
                Event::ExpRamp { time, value } => {
                    if t < time {
                        if time <= prev_time || prev_value <= 0.0 || value <= 0.0 {
                            return prev_value;
                        }
                        let frac = (t - prev_time) as f32 / (time - prev_time) as f32;
                        return prev_value * (value / prev_value).powf(frac);
                    }
                    prev_value = value;
                    prev_time = time;
                }
            }
        }
        prev_value
    }
}
