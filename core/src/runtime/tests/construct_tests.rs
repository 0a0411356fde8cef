//! Tests for object construction across captures

use super::helpers::{collect, forced_only, run_to_completion, runtimes, Outcome};
use crate::demos::{make_point, point_constructor};
use crate::runtime::{handle_new, Completion, Constructor, Runtime};
use crate::values::{ObjRef, Object, Val};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn test_suspended_constructor_keeps_its_receiver() {
    for rt in runtimes() {
        let strategy = rt.strategy();
        let (s, event_loop) = forced_only(rt);
        let seen: Rc<RefCell<Vec<ObjRef>>> = Rc::new(RefCell::new(Vec::new()));
        let ctor = point_constructor(&s, &seen);

        let outcome: Outcome = Rc::new(RefCell::new(None));
        s.run(
            Box::new(move |rt: &mut dyn Runtime| make_point(rt, &ctor, 1.0, 2.0)),
            collect(&outcome),
        )
        .unwrap();

        // Suspended inside the constructor body
        assert!(outcome.borrow().is_none());
        assert_eq!(seen.borrow().len(), 1);

        event_loop.run_until_idle();

        let completion = outcome.borrow_mut().take();
        let point = match completion {
            Some(Completion::Normal(Val::Obj(point))) => point,
            other => panic!("{:?}: expected an object, got {:?}", strategy, other),
        };

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2, "{:?}", strategy);
        assert!(Rc::ptr_eq(&seen[0], &seen[1]), "{:?}: receiver reallocated", strategy);
        assert!(Rc::ptr_eq(&seen[0], &point));

        let point = point.borrow();
        assert_eq!(point.class, "Point");
        assert_eq!(point.fields.get("x"), Some(&Val::Num(1.0)));
        assert_eq!(point.fields.get("y"), Some(&Val::Num(2.0)));
    }
}

#[test]
fn test_constructor_returning_an_object_replaces_receiver() {
    for mut rt in runtimes() {
        let ctor = Constructor::new(
            "Wrapper",
            |_: &mut dyn Runtime, _this: &ObjRef, _args: &[Val]| {
                Ok(Val::Obj(Object::alloc("Replacement")))
            },
        );

        let completion = run_to_completion(
            &mut *rt,
            Box::new(move |rt: &mut dyn Runtime| handle_new(rt, &ctor, Vec::new())),
        );

        match completion {
            Completion::Normal(Val::Obj(obj)) => assert_eq!(obj.borrow().class, "Replacement"),
            other => panic!("expected an object, got {:?}", other),
        }
    }
}

#[test]
fn test_constructor_without_suspension_returns_receiver() {
    for mut rt in runtimes() {
        let ctor = Constructor::new(
            "Counter",
            |_: &mut dyn Runtime, this: &ObjRef, args: &[Val]| {
                let start = args.first().cloned().unwrap_or(Val::Num(0.0));
                this.borrow_mut().fields.insert("count".into(), start);
                Ok(Val::Null)
            },
        );

        let completion = run_to_completion(
            &mut *rt,
            Box::new(move |rt: &mut dyn Runtime| handle_new(rt, &ctor, vec![Val::Num(3.0)])),
        );

        match completion {
            Completion::Normal(Val::Obj(obj)) => {
                let obj = obj.borrow();
                assert_eq!(obj.class, "Counter");
                assert_eq!(obj.fields.get("count"), Some(&Val::Num(3.0)));
            }
            other => panic!("expected an object, got {:?}", other),
        }
    }
}
