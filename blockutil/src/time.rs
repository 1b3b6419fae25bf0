use std::time::Instant;

pub fn elapsed_seconds(since: Instant) -> f64 {
    let dt = since.elapsed();
    (dt.as_secs() as f64) + (f64::from(dt.subsec_nanos()) * 1e-9)
}

pub fn prettyprint_usize(x: usize) -> String {
    let num = format!("{}", x);
    let mut result = String::new();
    let mut i = num.len();
    for c in num.chars() {
        result.push(c);
        i -= 1;
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
    }
    result
}

/// Hierarchical stopwatch for reporting the time spent in the stages of a pipeline. Nesting is
/// tracked by matching start/stop names; mismatches are programming errors and panic.
pub struct Timer {
    stack: Vec<(String, Instant)>,
    // (name, total items, processed so far)
    current_iter: Option<(String, usize, usize)>,
}

impl Timer {
    pub fn new(name: &str) -> Timer {
        let mut t = Timer {
            stack: Vec::new(),
            current_iter: None,
        };
        t.start(name);
        t
    }

    /// For callers that don't care about timing at all.
    pub fn throwaway() -> Timer {
        Timer {
            stack: Vec::new(),
            current_iter: None,
        }
    }

    pub fn start(&mut self, name: &str) {
        self.stack.push((name.to_string(), Instant::now()));
    }

    pub fn stop(&mut self, name: &str) {
        let (top, started) = self.stack.pop().expect("Timer::stop with nothing started");
        assert_eq!(top, name, "Timer::stop({}) doesn't match start({})", name, top);
        info!(
            "{}{}... {:.2}s",
            "  ".repeat(self.stack.len()),
            top,
            elapsed_seconds(started)
        );
    }

    pub fn start_iter(&mut self, name: &str, total_items: usize) {
        assert!(self.current_iter.is_none(), "Timer::start_iter while another is running");
        self.current_iter = Some((name.to_string(), total_items, 0));
        self.start(name);
    }

    pub fn next(&mut self) {
        let (_, total, ref mut done) = self
            .current_iter
            .as_mut()
            .expect("Timer::next without start_iter");
        *done += 1;
        assert!(*done <= *total);
    }

    pub fn end_iter(&mut self) {
        let (name, total, done) = self.current_iter.take().expect("Timer::end_iter without start_iter");
        assert_eq!(done, total, "{}: only {} of {} items processed", name, done, total);
        self.stop(&name);
    }

    pub fn done(mut self) {
        while let Some((name, _)) = self.stack.last().cloned() {
            self.stop(&name);
        }
    }
}
