use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use traffic_sim::signal::Signal;

#[test]
fn vehicle_spawned_style_signal_delivers_payload() {
    let mut signal: Signal<u64> = Signal::new();
    let received = Arc::new(AtomicU32::new(0));
    let received_clone = received.clone();
    signal.connect(move |id| {
        received_clone.store(*id as u32, Ordering::SeqCst);
    });

    signal.emit(&7);

    assert_eq!(received.load(Ordering::SeqCst), 7);
}
