mod builder;
mod decoder;
mod instruction;
mod op;

pub use builder::{BytecodeBuilder, Label};
pub use decoder::{BytecodeDecoder, DecodeError};
pub use instruction::{BinOp, Designation, Instruction, Pattern, Var};
pub use op::Op;

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Vec<Instruction> {
        BytecodeDecoder::new(bytes)
            .collect::<Result<_, _>>()
            .expect("well-formed bytecode")
    }

    #[test]
    fn opcode_bytes_are_stable() {
        assert_eq!(Op::Add as u8, 0x01);
        assert_eq!(Op::Const as u8, 0x10);
        assert_eq!(Op::End as u8, 0x16);
        assert_eq!(Op::LdArg as u8, 0x22);
        assert_eq!(Op::LdaLocal as u8, 0x31);
        assert_eq!(Op::StCaptured as u8, 0x43);
        assert_eq!(Op::Begin as u8, 0x52);
        assert_eq!(Op::Call as u8, 0x56);
        assert_eq!(Op::PattClosure as u8, 0x66);
        assert_eq!(Op::MakeArray as u8, 0x74);
        assert_eq!(Op::try_from(0x1a).ok(), Some(Op::Swap));
        assert!(Op::try_from(0x0e).is_err());
        assert!(Op::try_from(0xff).is_err());
    }

    #[test]
    fn round_trip_mixed_program() {
        let program = vec![
            Instruction::Begin { nargs: 2, nlocals: 1 },
            Instruction::Const { value: -7 },
            Instruction::Store(Var::local(0)),
            Instruction::Drop,
            Instruction::Load(Var::arg(1)),
            Instruction::LoadAddr(Var::global(3)),
            Instruction::Binop(BinOp::Le),
            Instruction::Sexp { tag: 0x10, arity: 2 },
            Instruction::Closure {
                entry: 0x40,
                captures: vec![Var::local(0), Var::captured(2)],
            },
            Instruction::Call { target: 0x80, nargs: 2 },
            Instruction::Pattern(Pattern::Unboxed),
            Instruction::Fail { line: 3, column: 9 },
            Instruction::MakeArray { len: 4 },
            Instruction::End,
        ];
        let mut b = BytecodeBuilder::new();
        for instruction in &program {
            b.emit(instruction);
        }
        assert_eq!(decode_all(b.as_bytes()), program);
    }

    #[test]
    fn designation_lives_in_the_opcode() {
        let mut b = BytecodeBuilder::new();
        b.load(Var::arg(5));
        assert_eq!(b.into_bytes(), vec![0x22, 5, 0, 0, 0]);
    }

    #[test]
    fn forward_labels_patch_absolute_targets() {
        let mut b = BytecodeBuilder::new();
        b.const_(0);
        let skip = b.jump_if_zero_forward();
        b.const_(1);
        b.bind(skip);
        let call = b.call_forward(0);
        b.end();
        b.bind_to(call, 0x99);

        assert_eq!(decode_all(b.as_bytes()), vec![
            Instruction::Const { value: 0 },
            Instruction::JumpIfZero { target: 15 },
            Instruction::Const { value: 1 },
            Instruction::Call { target: 0x99, nargs: 0 },
            Instruction::End,
        ]);
    }

    #[test]
    fn unknown_opcode_is_reported() {
        let mut d = BytecodeDecoder::new(&[0x00]);
        assert_eq!(d.decode(), Err(DecodeError::UnknownOpcode(0x00)));
    }

    #[test]
    fn truncated_immediates_are_reported() {
        let mut d = BytecodeDecoder::new(&[Op::Begin as u8, 1, 0, 0, 0, 2]);
        assert_eq!(
            d.decode(),
            Err(DecodeError::Truncated { needed: 8, available: 5 })
        );
    }

    #[test]
    fn closure_captures_are_validated() {
        let bytes = [Op::Closure as u8, 0, 0, 0, 0, 1, 0, 0, 0, 0x7, 0, 0, 0, 0];
        let mut d = BytecodeDecoder::new(&bytes);
        assert_eq!(d.decode(), Err(DecodeError::UnknownDesignation(0x7)));

        let huge = [Op::Closure as u8, 0, 0, 0, 0, 0xff, 0xff, 0xff, 0x7f];
        let mut d = BytecodeDecoder::new(&huge);
        assert!(matches!(d.decode(), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn decoder_starts_at_offset_and_tracks_position() {
        let mut b = BytecodeBuilder::new();
        b.const_(1);
        b.drop_();
        let bytes = b.into_bytes();
        let mut d = BytecodeDecoder::at(&bytes, 5);
        assert_eq!(d.decode(), Ok(Instruction::Drop));
        assert_eq!(d.offset(), 6);
        assert!(d.is_at_end());
    }

    #[test]
    fn iterator_stops_after_first_error() {
        let bytes = [Op::Dup as u8, 0xee, Op::Dup as u8];
        let results: Vec<_> = BytecodeDecoder::new(&bytes).collect();
        assert_eq!(results, vec![
            Ok(Instruction::Dup),
            Err(DecodeError::UnknownOpcode(0xee)),
        ]);
    }

    #[test]
    fn display_instructions() {
        assert_eq!(Instruction::Begin { nargs: 2, nlocals: 0 }.to_string(), "BEGIN 2 0");
        assert_eq!(Instruction::Load(Var::local(3)).to_string(), "LD L(3)");
        assert_eq!(Instruction::Binop(BinOp::Eq).to_string(), "BINOP ==");
        assert_eq!(
            Instruction::Closure {
                entry: 0x1c,
                captures: vec![Var::arg(0), Var::global(1)],
            }
            .to_string(),
            "CLOSURE 0x1c A(0) G(1)"
        );
        assert_eq!(Instruction::Pattern(Pattern::Boxed).to_string(), "PATT #ref");
    }
}
