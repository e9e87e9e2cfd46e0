//! Frame scheduler - deterministic animation-frame queue.
//!
//! Stand-in for the browser's animation-frame scheduler. Style staging
//! queues one callback per frame; the embedder (or a test) drives frames
//! explicitly with [`advance_frame`] / [`flush_frames`].
//!
//! Callbacks queued while a frame is running land in the next frame, so a
//! chain of N steps takes exactly N frames.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

/// A frame callback. Receives the frame timestamp (frame counter).
pub type FrameCallback = Box<dyn FnOnce(u64)>;

thread_local! {
    static FRAME_QUEUE: RefCell<VecDeque<FrameCallback>> = RefCell::new(VecDeque::new());
    static FRAME_TIME: Cell<u64> = const { Cell::new(0) };
}

/// Queue a callback for the next frame.
pub fn request_frame(callback: impl FnOnce(u64) + 'static) {
    FRAME_QUEUE.with(|queue| queue.borrow_mut().push_back(Box::new(callback)));
}

/// Run an ordered sequence of steps, one per frame, then `done`.
///
/// An empty sequence completes immediately (synchronously).
pub fn next_frames(steps: Vec<FrameCallback>, done: impl FnOnce() + 'static) {
    let mut steps: VecDeque<FrameCallback> = steps.into();
    if steps.is_empty() {
        done();
        return;
    }
    let first = steps.pop_front().expect("non-empty step queue");
    request_frame(move |time| {
        first(time);
        next_frames(steps.into(), done);
    });
}

/// Run every callback queued for the current frame. Returns `false` when
/// the queue was empty. Callbacks queued during the run are deferred to the
/// next frame.
pub fn advance_frame() -> bool {
    let batch: Vec<FrameCallback> = FRAME_QUEUE.with(|queue| queue.borrow_mut().drain(..).collect());
    if batch.is_empty() {
        return false;
    }
    let time = FRAME_TIME.with(|t| {
        let time = t.get() + 1;
        t.set(time);
        time
    });
    for callback in batch {
        callback(time);
    }
    true
}

/// Advance frames until the queue drains.
pub fn flush_frames() {
    while advance_frame() {}
}

/// Number of callbacks waiting for the next frame.
pub fn pending_frames() -> usize {
    FRAME_QUEUE.with(|queue| queue.borrow().len())
}

/// Drop all queued callbacks and reset the frame clock (for tests).
pub fn reset_frames() {
    FRAME_QUEUE.with(|queue| queue.borrow_mut().clear());
    FRAME_TIME.with(|t| t.set(0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_request_frame_runs_on_advance() {
        reset_frames();
        let ran = Rc::new(RefCell::new(false));
        let ran_clone = ran.clone();
        request_frame(move |_| *ran_clone.borrow_mut() = true);

        assert!(!*ran.borrow());
        assert!(advance_frame());
        assert!(*ran.borrow());
        assert!(!advance_frame(), "queue should be drained");
    }

    #[test]
    fn test_nested_request_defers_to_next_frame() {
        reset_frames();
        let order = Rc::new(RefCell::new(Vec::new()));
        let order_clone = order.clone();
        request_frame(move |_| {
            order_clone.borrow_mut().push("outer");
            let order_inner = order_clone.clone();
            request_frame(move |_| order_inner.borrow_mut().push("inner"));
        });

        advance_frame();
        assert_eq!(*order.borrow(), vec!["outer"]);
        advance_frame();
        assert_eq!(*order.borrow(), vec!["outer", "inner"]);
    }

    #[test]
    fn test_next_frames_one_step_per_frame() {
        reset_frames();
        let steps = Rc::new(RefCell::new(Vec::new()));
        let done = Rc::new(RefCell::new(false));

        let s1 = steps.clone();
        let s2 = steps.clone();
        let done_clone = done.clone();
        next_frames(
            vec![
                Box::new(move |_| s1.borrow_mut().push(1)),
                Box::new(move |_| s2.borrow_mut().push(2)),
            ],
            move || *done_clone.borrow_mut() = true,
        );

        advance_frame();
        assert_eq!(*steps.borrow(), vec![1]);
        assert!(!*done.borrow());

        advance_frame();
        assert_eq!(*steps.borrow(), vec![1, 2]);
        assert!(*done.borrow());
    }

    #[test]
    fn test_next_frames_empty_completes_synchronously() {
        reset_frames();
        let done = Rc::new(RefCell::new(false));
        let done_clone = done.clone();
        next_frames(Vec::new(), move || *done_clone.borrow_mut() = true);
        assert!(*done.borrow());
        assert_eq!(pending_frames(), 0);
    }
}
