//! Array, struct and map instructions.

use super::ExecutionEngine;
use crate::error::{VmError, VmResult};
use crate::op_code::OpCode;
use crate::stack_item::{StackItem, MAX_ARRAY_SIZE};

impl ExecutionEngine {
    pub(super) fn op_compound(&mut self, opcode: OpCode) -> VmResult<()> {
        match opcode {
            OpCode::ARRAYSIZE => {
                let item = self.evaluation_stack.pop()?;
                let size = item.size()?;
                self.evaluation_stack.push(StackItem::from_int(size as u64));
            }
            OpCode::PACK => {
                let count = self.pop_count("PACK", MAX_ARRAY_SIZE)?;
                if count > self.evaluation_stack.len() {
                    return Err(VmError::stack_underflow(count, self.evaluation_stack.len()));
                }
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.evaluation_stack.pop()?);
                }
                self.evaluation_stack.push(StackItem::from_array(items));
            }
            OpCode::UNPACK => {
                let items = self.pop_array("UNPACK")?;
                let count = items.len();
                for item in items.into_iter().rev() {
                    self.evaluation_stack.push(item);
                }
                self.evaluation_stack.push(StackItem::from_int(count as u64));
            }
            OpCode::PICKITEM => self.op_pick_item()?,
            OpCode::SETITEM => self.op_set_item()?,
            OpCode::NEWARRAY => {
                let count = self.pop_count("NEWARRAY", MAX_ARRAY_SIZE)?;
                let items = vec![StackItem::from_bool(false); count];
                self.evaluation_stack.push(StackItem::from_array(items));
            }
            OpCode::NEWSTRUCT => {
                let count = self.pop_count("NEWSTRUCT", MAX_ARRAY_SIZE)?;
                let items = vec![StackItem::from_bool(false); count];
                self.evaluation_stack.push(StackItem::from_struct(items));
            }
            OpCode::NEWMAP => {
                self.evaluation_stack.push(StackItem::new_map());
            }
            OpCode::APPEND => {
                let value = self.evaluation_stack.pop()?.clone_value();
                let collection = self.evaluation_stack.pop()?;
                match collection {
                    StackItem::Array(items) | StackItem::Struct(items) => {
                        let mut items = items.lock();
                        if items.len() >= MAX_ARRAY_SIZE {
                            return Err(VmError::ItemTooLarge {
                                size: items.len() + 1,
                                limit: MAX_ARRAY_SIZE,
                            });
                        }
                        items.push(value);
                    }
                    other => {
                        return Err(VmError::invalid_cast(other.type_name(), "Array"));
                    }
                }
            }
            OpCode::REVERSE => {
                let items = self.pop_shared_items("REVERSE")?;
                items.lock().reverse();
            }
            OpCode::REMOVE => self.op_remove()?,
            OpCode::HASKEY => self.op_has_key()?,
            OpCode::KEYS => {
                let entries = self.pop_map("KEYS")?;
                let keys: Vec<StackItem> =
                    entries.lock().iter().map(|(key, _)| key.clone()).collect();
                self.evaluation_stack.push(StackItem::from_array(keys));
            }
            OpCode::VALUES => {
                let item = self.evaluation_stack.pop()?;
                let values: Vec<StackItem> = match &item {
                    StackItem::Array(items) | StackItem::Struct(items) => {
                        items.lock().iter().map(StackItem::clone_value).collect()
                    }
                    StackItem::Map(entries) => entries
                        .lock()
                        .iter()
                        .map(|(_, value)| value.clone_value())
                        .collect(),
                    other => {
                        return Err(VmError::invalid_cast(other.type_name(), "Array or Map"))
                    }
                };
                self.evaluation_stack.push(StackItem::from_array(values));
            }
            other => {
                return Err(VmError::invalid_operation(
                    other.mnemonic(),
                    "not a compound operation",
                ))
            }
        }
        Ok(())
    }

    fn op_pick_item(&mut self) -> VmResult<()> {
        let key = self.evaluation_stack.pop()?;
        let collection = self.evaluation_stack.pop()?;
        let value = match &collection {
            StackItem::Array(items) | StackItem::Struct(items) => {
                let index = crate::stack_item::to_index(&key.to_int()?, "PICKITEM")?;
                let items = items.lock();
                items
                    .get(index)
                    .cloned()
                    .ok_or_else(|| index_out_of_range("PICKITEM", index, items.len()))?
            }
            StackItem::Map(entries) => {
                check_map_key(&key)?;
                entries
                    .lock()
                    .iter()
                    .find(|(entry_key, _)| entry_key.equals(&key))
                    .map(|(_, value)| value.clone())
                    .ok_or_else(|| {
                        VmError::invalid_operation("PICKITEM", "key not present in map")
                    })?
            }
            other => return Err(VmError::invalid_cast(other.type_name(), "Array or Map")),
        };
        self.evaluation_stack.push(value);
        Ok(())
    }

    fn op_set_item(&mut self) -> VmResult<()> {
        let value = self.evaluation_stack.pop()?.clone_value();
        let key = self.evaluation_stack.pop()?;
        let collection = self.evaluation_stack.pop()?;
        match &collection {
            StackItem::Array(items) | StackItem::Struct(items) => {
                let index = crate::stack_item::to_index(&key.to_int()?, "SETITEM")?;
                let mut items = items.lock();
                let len = items.len();
                *items
                    .get_mut(index)
                    .ok_or_else(|| index_out_of_range("SETITEM", index, len))? = value;
            }
            StackItem::Map(entries) => {
                check_map_key(&key)?;
                let mut entries = entries.lock();
                if let Some(entry) = entries.iter_mut().find(|(entry_key, _)| entry_key.equals(&key))
                {
                    entry.1 = value;
                } else {
                    if entries.len() >= MAX_ARRAY_SIZE {
                        return Err(VmError::ItemTooLarge {
                            size: entries.len() + 1,
                            limit: MAX_ARRAY_SIZE,
                        });
                    }
                    entries.push((key, value));
                }
            }
            other => return Err(VmError::invalid_cast(other.type_name(), "Array or Map")),
        }
        Ok(())
    }

    fn op_remove(&mut self) -> VmResult<()> {
        let key = self.evaluation_stack.pop()?;
        let collection = self.evaluation_stack.pop()?;
        match &collection {
            StackItem::Array(items) | StackItem::Struct(items) => {
                let index = crate::stack_item::to_index(&key.to_int()?, "REMOVE")?;
                let mut items = items.lock();
                if index >= items.len() {
                    return Err(index_out_of_range("REMOVE", index, items.len()));
                }
                items.remove(index);
            }
            StackItem::Map(entries) => {
                check_map_key(&key)?;
                entries
                    .lock()
                    .retain(|(entry_key, _)| !entry_key.equals(&key));
            }
            other => return Err(VmError::invalid_cast(other.type_name(), "Array or Map")),
        }
        Ok(())
    }

    fn op_has_key(&mut self) -> VmResult<()> {
        let key = self.evaluation_stack.pop()?;
        let collection = self.evaluation_stack.pop()?;
        let found = match &collection {
            StackItem::Array(items) | StackItem::Struct(items) => {
                let index = crate::stack_item::to_index(&key.to_int()?, "HASKEY")?;
                index < items.lock().len()
            }
            StackItem::Map(entries) => {
                check_map_key(&key)?;
                entries
                    .lock()
                    .iter()
                    .any(|(entry_key, _)| entry_key.equals(&key))
            }
            other => return Err(VmError::invalid_cast(other.type_name(), "Array or Map")),
        };
        self.evaluation_stack.push(StackItem::from_bool(found));
        Ok(())
    }

    fn pop_array(&mut self, operation: &str) -> VmResult<Vec<StackItem>> {
        match self.evaluation_stack.pop()? {
            StackItem::Array(items) | StackItem::Struct(items) => Ok(items.lock().clone()),
            other => Err(VmError::invalid_operation(
                operation,
                format!("expected Array, found {}", other.type_name()),
            )),
        }
    }

    fn pop_shared_items(&mut self, operation: &str) -> VmResult<crate::stack_item::SharedItems> {
        match self.evaluation_stack.pop()? {
            StackItem::Array(items) | StackItem::Struct(items) => Ok(items),
            other => Err(VmError::invalid_operation(
                operation,
                format!("expected Array, found {}", other.type_name()),
            )),
        }
    }

    fn pop_map(&mut self, operation: &str) -> VmResult<crate::stack_item::SharedEntries> {
        match self.evaluation_stack.pop()? {
            StackItem::Map(entries) => Ok(entries),
            other => Err(VmError::invalid_operation(
                operation,
                format!("expected Map, found {}", other.type_name()),
            )),
        }
    }
}

fn index_out_of_range(operation: &str, index: usize, len: usize) -> VmError {
    VmError::invalid_operation(operation, format!("index {index} out of range 0..{len}"))
}

fn check_map_key(key: &StackItem) -> VmResult<()> {
    match key {
        StackItem::ByteArray(_) | StackItem::Boolean(_) | StackItem::Integer(_) => Ok(()),
        other => Err(VmError::invalid_operation(
            "map key",
            format!("{} cannot be a map key", other.type_name()),
        )),
    }
}
