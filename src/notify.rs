//! Worker-scoped typed pub/sub.
//!
//! Notifications let a stage publish a diagnostic or event without widening
//! its own return type. Handlers are keyed by the publisher's static type
//! (`TypeId`) and registered only for the lifetime of the owning chain's
//! run, so two chains running on two different workers never cross-talk —
//! each worker has its own registry.
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;

type BoxedHandler = Box<dyn Fn(&dyn Any)>;

thread_local! {
    static REGISTRY: RefCell<HashMap<TypeId, BoxedHandler>> = RefCell::new(HashMap::new());
}

/// Installs `handler` for notification type `D` on the calling worker.
/// Replaces any previously bound handler for the same type.
pub(crate) fn bind<D: 'static>(handler: impl Fn(&D) + 'static) {
    let boxed: BoxedHandler = Box::new(move |value: &dyn Any| {
        if let Some(typed) = value.downcast_ref::<D>() {
            handler(typed);
        }
    });
    REGISTRY.with(|registry| {
        registry.borrow_mut().insert(TypeId::of::<D>(), boxed);
    });
}

/// Removes the handler for notification type `D` on the calling worker, if
/// any is bound.
pub(crate) fn unbind<D: 'static>() {
    REGISTRY.with(|registry| {
        registry.borrow_mut().remove(&TypeId::of::<D>());
    });
}

/// Delivers `value` to the handler bound for type `D` on the calling
/// worker. A silent no-op if nothing is bound — notifications are
/// diagnostics, not a required channel.
pub fn publish<D: 'static>(value: D) {
    REGISTRY.with(|registry| {
        if let Some(handler) = registry.borrow().get(&TypeId::of::<D>()) {
            handler(&value);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;
    use std::rc::Rc;

    #[test]
    fn publish_with_no_binding_is_noop() {
        publish(42i32); // must not panic
    }

    #[test]
    fn bind_then_publish_delivers_to_handler() {
        let seen: Rc<StdRefCell<Vec<String>>> = Rc::new(StdRefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        bind::<String>(move |v| seen_clone.borrow_mut().push(v.clone()));

        publish(String::from("hello"));
        publish(42i32); // different type, no handler bound, no-op

        assert_eq!(*seen.borrow(), vec!["hello".to_string()]);
        unbind::<String>();
    }

    #[test]
    fn unbind_removes_handler() {
        let count = Rc::new(StdRefCell::new(0));
        let count_clone = count.clone();
        bind::<i32>(move |_| *count_clone.borrow_mut() += 1);
        publish(1i32);
        unbind::<i32>();
        publish(2i32);
        assert_eq!(*count.borrow(), 1);
    }
}
