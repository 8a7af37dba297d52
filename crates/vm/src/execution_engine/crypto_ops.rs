//! Hash and signature-check instructions.

use super::ExecutionEngine;
use crate::error::{VmError, VmResult};
use crate::op_code::OpCode;
use crate::stack_item::StackItem;

impl ExecutionEngine {
    pub(super) fn op_crypto(&mut self, opcode: OpCode) -> VmResult<()> {
        match opcode {
            OpCode::SHA1 => {
                let data = self.evaluation_stack.pop_bytes()?;
                self.evaluation_stack
                    .push(StackItem::from_bytes(neodbg_crypto::sha1(&data).to_vec()));
            }
            OpCode::SHA256 => {
                let data = self.evaluation_stack.pop_bytes()?;
                self.evaluation_stack
                    .push(StackItem::from_bytes(neodbg_crypto::sha256(&data).to_vec()));
            }
            OpCode::HASH160 => {
                let data = self.evaluation_stack.pop_bytes()?;
                self.evaluation_stack
                    .push(StackItem::from_bytes(neodbg_crypto::hash160(&data).to_vec()));
            }
            OpCode::HASH256 => {
                let data = self.evaluation_stack.pop_bytes()?;
                self.evaluation_stack
                    .push(StackItem::from_bytes(neodbg_crypto::hash256(&data).to_vec()));
            }
            OpCode::CHECKSIG => {
                let public_key = self.evaluation_stack.pop_bytes()?;
                let signature = self.evaluation_stack.pop_bytes()?;
                let message = self.host.container_message();
                let valid = neodbg_crypto::verify_signature(&message, &signature, &public_key);
                self.evaluation_stack.push(StackItem::from_bool(valid));
            }
            OpCode::VERIFY => {
                let public_key = self.evaluation_stack.pop_bytes()?;
                let signature = self.evaluation_stack.pop_bytes()?;
                let message = self.evaluation_stack.pop_bytes()?;
                let valid = neodbg_crypto::verify_signature(&message, &signature, &public_key);
                self.evaluation_stack.push(StackItem::from_bool(valid));
            }
            OpCode::CHECKMULTISIG => self.op_check_multisig()?,
            other => {
                return Err(VmError::invalid_operation(
                    other.mnemonic(),
                    "not a crypto operation",
                ))
            }
        }
        Ok(())
    }

    /// m-of-n signature check. Public keys and signatures each arrive as
    /// either an array item or a count followed by that many items.
    /// Signatures must match public keys in order.
    fn op_check_multisig(&mut self) -> VmResult<()> {
        let public_keys = self.pop_byte_array_group("CHECKMULTISIG")?;
        let signatures = self.pop_byte_array_group("CHECKMULTISIG")?;
        // Degenerate groups fail the check; they do not fault.
        if public_keys.is_empty() || signatures.is_empty() || signatures.len() > public_keys.len()
        {
            self.evaluation_stack.push(StackItem::from_bool(false));
            return Ok(());
        }

        let message = self.host.container_message();
        let mut valid = true;
        let mut key_index = 0;
        for (sig_index, signature) in signatures.iter().enumerate() {
            loop {
                if key_index >= public_keys.len() {
                    valid = false;
                    break;
                }
                if neodbg_crypto::verify_signature(&message, signature, &public_keys[key_index]) {
                    key_index += 1;
                    break;
                }
                key_index += 1;
                // Fewer keys left than signatures still to match.
                if public_keys.len() - key_index < signatures.len() - sig_index {
                    valid = false;
                    break;
                }
            }
            if !valid {
                break;
            }
        }

        self.evaluation_stack.push(StackItem::from_bool(valid));
        Ok(())
    }

    fn pop_byte_array_group(&mut self, operation: &str) -> VmResult<Vec<Vec<u8>>> {
        let head = self.evaluation_stack.pop()?;
        match head {
            StackItem::Array(items) => {
                let items = items.lock().clone();
                items.iter().map(StackItem::to_bytes).collect()
            }
            other => {
                let count = crate::stack_item::to_index(&other.to_int()?, operation)?;
                if count > self.evaluation_stack.len() {
                    return Err(VmError::stack_underflow(count, self.evaluation_stack.len()));
                }
                let mut group = Vec::with_capacity(count);
                for _ in 0..count {
                    group.push(self.evaluation_stack.pop_bytes()?);
                }
                Ok(group)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use neodbg_crypto::KeyPair;

    use crate::execution_engine::ExecutionEngine;
    use crate::host::NullHost;
    use crate::interop_service::InteropService;
    use crate::stack_item::StackItem;
    use crate::vm_state::VMState;

    fn engine_with(script: Vec<u8>) -> ExecutionEngine {
        let mut engine = ExecutionEngine::new(Box::new(NullHost), InteropService::new());
        engine.load_script(script);
        engine
    }

    fn run_to_end(engine: &mut ExecutionEngine) {
        while engine.state() == VMState::NONE {
            engine.step_into();
        }
    }

    fn top_bool(engine: &ExecutionEngine) -> bool {
        engine.evaluation_stack().peek(0).unwrap().to_bool()
    }

    #[test]
    fn hash_opcodes_match_the_primitives() {
        let cases: [(u8, Vec<u8>); 4] = [
            (0xA7, neodbg_crypto::sha1(b"abc").to_vec()),
            (0xA8, neodbg_crypto::sha256(b"abc").to_vec()),
            (0xA9, neodbg_crypto::hash160(b"abc").to_vec()),
            (0xAA, neodbg_crypto::hash256(b"abc").to_vec()),
        ];
        for (opcode, expected) in cases {
            // PUSHBYTES3 "abc" <hash-op> RET
            let mut engine = engine_with(vec![0x03, b'a', b'b', b'c', opcode, 0x66]);
            run_to_end(&mut engine);
            assert!(engine.state().is_halt());
            assert_eq!(
                engine.evaluation_stack().peek(0).unwrap().to_bytes().unwrap(),
                expected,
                "opcode {opcode:#04x}"
            );
        }
    }

    #[test]
    fn checksig_verifies_against_the_container_message() {
        // NullHost's container message is empty; sign exactly that.
        let keypair = KeyPair::generate();
        let signature = keypair.sign(&[]);

        let mut engine = engine_with(vec![0xAC, 0x66]); // CHECKSIG RET
        engine
            .evaluation_stack_mut()
            .push(StackItem::from_bytes(signature.clone()));
        engine
            .evaluation_stack_mut()
            .push(StackItem::from_bytes(keypair.public_key()));
        run_to_end(&mut engine);
        assert!(engine.state().is_halt());
        assert!(top_bool(&engine));

        // A different key fails the same signature.
        let mut engine = engine_with(vec![0xAC, 0x66]);
        engine
            .evaluation_stack_mut()
            .push(StackItem::from_bytes(signature));
        engine
            .evaluation_stack_mut()
            .push(StackItem::from_bytes(KeyPair::generate().public_key()));
        run_to_end(&mut engine);
        assert!(engine.state().is_halt());
        assert!(!top_bool(&engine));
    }

    #[test]
    fn verify_checks_an_explicit_message() {
        let keypair = KeyPair::generate();
        let message = b"signed payload".to_vec();
        let signature = keypair.sign(&message);

        // VERIFY pops pubkey, signature, message.
        let mut engine = engine_with(vec![0xAD, 0x66]);
        engine
            .evaluation_stack_mut()
            .push(StackItem::from_bytes(message));
        engine
            .evaluation_stack_mut()
            .push(StackItem::from_bytes(signature));
        engine
            .evaluation_stack_mut()
            .push(StackItem::from_bytes(keypair.public_key()));
        run_to_end(&mut engine);
        assert!(engine.state().is_halt());
        assert!(top_bool(&engine));
    }

    /// Loads a multisig check in count form. The handler pops the key
    /// group first, so the stack from bottom to top is: signatures,
    /// signature count, keys, key count.
    fn multisig_engine(keys: &[KeyPair], signatures: &[Vec<u8>]) -> ExecutionEngine {
        let mut engine = engine_with(vec![0xAE, 0x66]); // CHECKMULTISIG RET
        for signature in signatures.iter().rev() {
            engine
                .evaluation_stack_mut()
                .push(StackItem::from_bytes(signature.clone()));
        }
        engine
            .evaluation_stack_mut()
            .push(StackItem::from_int(signatures.len() as u64));
        for keypair in keys.iter().rev() {
            engine
                .evaluation_stack_mut()
                .push(StackItem::from_bytes(keypair.public_key()));
        }
        engine
            .evaluation_stack_mut()
            .push(StackItem::from_int(keys.len() as u64));
        engine
    }

    #[test]
    fn check_multisig_accepts_ordered_signatures() {
        let keys: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
        // Signatures by keys 0 and 2, supplied in key order.
        let signatures = vec![keys[0].sign(&[]), keys[2].sign(&[])];

        let mut engine = multisig_engine(&keys, &signatures);
        run_to_end(&mut engine);
        assert!(engine.state().is_halt());
        assert!(top_bool(&engine));
    }

    #[test]
    fn check_multisig_rejects_out_of_order_signatures() {
        let keys: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
        // Same two signers, but key 2's signature listed first.
        let signatures = vec![keys[2].sign(&[]), keys[0].sign(&[])];

        let mut engine = multisig_engine(&keys, &signatures);
        run_to_end(&mut engine);
        assert!(engine.state().is_halt());
        assert!(!top_bool(&engine));
    }

    #[test]
    fn check_multisig_fails_degenerate_groups_without_faulting() {
        // More signatures than keys.
        let keys = vec![KeyPair::generate()];
        let signatures = vec![keys[0].sign(&[]), keys[0].sign(&[])];
        let mut engine = multisig_engine(&keys, &signatures);
        run_to_end(&mut engine);
        assert!(engine.state().is_halt());
        assert!(!top_bool(&engine));

        // Zero keys and zero signatures.
        let mut engine = multisig_engine(&[], &[]);
        run_to_end(&mut engine);
        assert!(engine.state().is_halt());
        assert!(!top_bool(&engine));
    }
}
