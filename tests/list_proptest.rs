use hoh::{ConcurrentList, ListError, OptimisticList, RwList};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Operation {
    Add(u16),
    Get(u8),
    Set(u8, u16),
    Replace(u8, u16),
}

fn operations() -> impl Strategy<Value = Vec<Operation>> {
    proptest::collection::vec(
        prop_oneof![
            3 => any::<u16>().prop_map(Operation::Add),
            2 => any::<u8>().prop_map(Operation::Get),
            1 => (any::<u8>(), any::<u16>()).prop_map(|(i, v)| Operation::Set(i, v)),
            1 => (any::<u8>(), any::<u16>()).prop_map(|(i, v)| Operation::Replace(i, v)),
        ],
        1..200,
    )
}

/// What the list must answer for an index into `model`.
fn expected<T: Clone>(model: &[T], index: usize) -> Result<Option<T>, ListError> {
    if model.is_empty() {
        Ok(None)
    } else if index < model.len() {
        Ok(Some(model[index].clone()))
    } else {
        Err(ListError::IndexOutOfRange { index, len: model.len() })
    }
}

macro_rules! model_test {
    ($name:ident, $list:ty) => {
        proptest! {
            #[test]
            fn $name(ops in operations()) {
                let list: $list = ConcurrentList::new();
                let mut model: Vec<u16> = Vec::new();

                for op in ops {
                    match op {
                        Operation::Add(v) => {
                            prop_assert_eq!(list.add(v), Ok(true));
                            model.push(v);
                        }
                        Operation::Get(i) => {
                            let i = usize::from(i);
                            prop_assert_eq!(list.get(i), expected(&model, i), "get({})", i);
                        }
                        Operation::Set(i, v) => {
                            let i = usize::from(i);
                            let want = expected(&model, i).map(|found| found.map(|_| v));
                            prop_assert_eq!(list.set(i, v), want, "set({})", i);
                            if i < model.len() {
                                model[i] = v;
                            }
                        }
                        Operation::Replace(i, v) => {
                            let i = usize::from(i);
                            prop_assert_eq!(list.replace(i, v), expected(&model, i), "replace({})", i);
                            if i < model.len() {
                                model[i] = v;
                            }
                        }
                    }
                    prop_assert!(list.is_unlocked());
                }

                prop_assert_eq!(list.is_empty(), Ok(model.is_empty()));
                prop_assert_eq!(list.len(), Ok(model.len()));
                prop_assert_eq!(list.to_vec(), Ok(model));
            }
        }
    };
}

model_test!(optimistic_list_matches_vec, OptimisticList<u16>);
model_test!(rw_list_matches_vec, RwList<u16>);
