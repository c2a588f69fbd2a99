//! Print assembled bytecode.

use std::io;

use yansi::Paint;

use knight_bc::CodePoint;

/// One record per line: a dimmed offset, the opcode mnemonic and its
/// operands as the environment will see them.
pub fn print_bytecode(code: &[CodePoint], f: &mut dyn io::Write) -> io::Result<()> {
    let mut offset = 0;
    while offset < code.len() {
        let op = code[offset].op();
        write!(f, "{:>5} {:<10}", Paint::rgb(150, 150, 150, offset), op)?;
        for i in 0..op.num_labels() {
            write!(f, " {}", code[offset + 1 + i].label())?;
        }
        writeln!(f)?;
        offset += 1 + op.num_labels();
    }
    Ok(())
}
