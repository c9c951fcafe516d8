use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use asyncflow::{observe, ObservableQueue};

fn trace() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

#[test]
fn streaming_drains_items_pushed_before_close_in_fifo_order() {
    let queue = ObservableQueue::<String>::new();
    queue.push_some(["1", "2", "3"].map(String::from));

    let log = trace();
    let l_recv = log.clone();
    let l_get = log.clone();
    let l_exc = log.clone();
    let l_begin = log.clone();
    let l_end = log.clone();

    let handle = observe(queue.clone())
        .receive_one(move |item: String| {
            l_recv.lock().unwrap().push(format!("receive {item}"));
            "transformed".to_string()
        })
        .get(move |s: String| {
            l_get.lock().unwrap().push(format!("get {s}"));
        })
        .then(move || -> () { panic!("boom") })
        .on_exception(move |_| l_exc.lock().unwrap().push("exception".to_string()))
        .on_begin(move || l_begin.lock().unwrap().push("begin".to_string()))
        .on_end(move || l_end.lock().unwrap().push("end".to_string()))
        .run();

    queue.close();
    handle.join();

    let log = log.lock().unwrap();
    assert_eq!(log.first(), Some(&"begin".to_string()));
    assert_eq!(log.last(), Some(&"end".to_string()));

    let body = &log[1..log.len() - 1];
    assert_eq!(
        body,
        [
            "receive 1",
            "get transformed",
            "exception",
            "receive 2",
            "get transformed",
            "exception",
            "receive 3",
            "get transformed",
            "exception",
        ]
    );
}

#[test]
fn streaming_receive_some_cancel_never_leaves_a_partial_block() {
    let queue = ObservableQueue::<i32>::new();
    queue.push_some([1, 2, 3]);

    let log = trace();
    let l_recv = log.clone();
    let l_get = log.clone();
    let l_exc = log.clone();

    let handle = observe(queue.clone())
        .receive_some(move |batch: Vec<i32>| {
            l_recv.lock().unwrap().push(format!("receive {}", batch.len()));
        })
        .get(move |_: ()| {
            l_get.lock().unwrap().push("get".to_string());
        })
        .then(move || -> () { panic!("boom") })
        .on_exception(move |_| l_exc.lock().unwrap().push("exception".to_string()))
        .run();

    handle.cancel();
    handle.join();

    let log = log.lock().unwrap();
    assert_eq!(log.len() % 3, 0, "no partial block should ever be recorded");
    for block in log.chunks(3) {
        assert!(block[0].starts_with("receive "));
        assert_eq!(block[1], "get");
        assert_eq!(block[2], "exception");
    }
    assert!(handle.is_cancelled());
}

#[test]
fn close_without_cancel_ignores_pushes_made_after_close() {
    let queue = ObservableQueue::<i32>::new();
    queue.push_some([1, 2, 3]);

    let log: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));
    let l_recv = log.clone();

    let handle = observe(queue.clone())
        .receive_one(move |item: i32| {
            l_recv.lock().unwrap().push(item);
        })
        .run();

    // Give the worker a chance to start draining before we close and push
    // more — the assertion holds either way, but this keeps the scenario
    // honest: some items may already be delivered by the time we close.
    thread::sleep(Duration::from_millis(10));

    queue.close();
    queue.push_one(4); // ignored: queue already closed
    queue.push_some([5, 6, 7]); // ignored too

    handle.join();

    assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
}
