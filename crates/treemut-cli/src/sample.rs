//! Built-in starter program.

use treemut_ir::{BinaryOp, Program, ProgramBuilder, Type, UnaryOp, Validator};

// var<private> total : i32;
// fn clamp(v : i32, lo : i32, hi : i32) -> i32 {
//   if ((v < lo)) { return lo; }
//   if ((v > hi)) { return hi; }
//   return v;
// }
// fn accumulate(n : i32) -> i32 {
//   var acc = 0i; var step = 1i; let bias = -(n);
//   for (var i = 0i; (i < n); i++) {
//     acc += (step * i);
//     if (((acc & 1i) == 0i)) { step = (step + 1i); } else { continue; }
//   }
//   total = clamp((acc ^ bias), 0i, 1000i);
//   return total;
// }
pub fn starter_program(validator: &dyn Validator) -> Program {
    let mut b = ProgramBuilder::new();
    let total = b.global_var("total", Type::I32, None);

    let v = b.param("v", Type::I32);
    let lo = b.param("lo", Type::I32);
    let hi = b.param("hi", Type::I32);
    let v1 = b.ident("v");
    let lo1 = b.ident("lo");
    let below = b.less_than(v1, lo1);
    let lo2 = b.ident("lo");
    let ret_lo = b.return_stmt(Some(lo2));
    let then_lo = b.block(vec![ret_lo]);
    let if_lo = b.if_stmt(below, then_lo, None);
    let v2 = b.ident("v");
    let hi1 = b.ident("hi");
    let above = b.binary(BinaryOp::GreaterThan, v2, hi1);
    let hi2 = b.ident("hi");
    let ret_hi = b.return_stmt(Some(hi2));
    let then_hi = b.block(vec![ret_hi]);
    let if_hi = b.if_stmt(above, then_hi, None);
    let v3 = b.ident("v");
    let ret_v = b.return_stmt(Some(v3));
    let clamp_body = b.block(vec![if_lo, if_hi, ret_v]);
    let clamp = b.function("clamp", vec![v, lo, hi], Some(Type::I32), clamp_body);

    let n = b.param("n", Type::I32);
    let zero = b.lit_i32(0);
    let acc_decl = b.var_decl("acc", zero);
    let one = b.lit_i32(1);
    let step_decl = b.var_decl("step", one);
    let n1 = b.ident("n");
    let neg_n = b.unary(UnaryOp::Negation, n1);
    let bias_decl = b.let_decl("bias", neg_n);

    let zero_i = b.lit_i32(0);
    let i_decl = b.var_decl("i", zero_i);
    let i1 = b.ident("i");
    let n2 = b.ident("n");
    let cond = b.less_than(i1, n2);
    let i2 = b.ident("i");
    let inc = b.increment(i2);
    let acc1 = b.ident("acc");
    let step1 = b.ident("step");
    let i3 = b.ident("i");
    let prod = b.binary(BinaryOp::Multiply, step1, i3);
    let accumulate_stmt = b.compound_assign(BinaryOp::Add, acc1, prod);
    let acc2 = b.ident("acc");
    let mask = b.lit_i32(1);
    let masked = b.binary(BinaryOp::And, acc2, mask);
    let zero_cmp = b.lit_i32(0);
    let even = b.binary(BinaryOp::Equal, masked, zero_cmp);
    let step2 = b.ident("step");
    let step3 = b.ident("step");
    let one_more = b.lit_i32(1);
    let bumped = b.add(step3, one_more);
    let bump = b.assign(step2, bumped);
    let then_even = b.block(vec![bump]);
    let cont = b.continue_stmt();
    let else_odd = b.block(vec![cont]);
    let if_even = b.if_stmt(even, then_even, Some(else_odd));
    let loop_body = b.block(vec![accumulate_stmt, if_even]);
    let for_loop = b.for_stmt(Some(i_decl), Some(cond), Some(inc), loop_body);

    let total1 = b.ident("total");
    let acc3 = b.ident("acc");
    let bias = b.ident("bias");
    let mixed = b.binary(BinaryOp::Xor, acc3, bias);
    let floor = b.lit_i32(0);
    let ceiling = b.lit_i32(1000);
    let clamped = b.call("clamp", vec![mixed, floor, ceiling]);
    let store = b.assign(total1, clamped);
    let total2 = b.ident("total");
    let ret_total = b.return_stmt(Some(total2));
    let acc_body = b.block(vec![
        acc_decl, step_decl, bias_decl, for_loop, store, ret_total,
    ]);
    let accumulate = b.function("accumulate", vec![n], Some(Type::I32), acc_body);

    b.build(vec![total, clamp, accumulate], validator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use treemut_ir::{Printer, Resolver};

    #[test]
    fn test_starter_program_is_valid() {
        let program = starter_program(&Resolver::new());
        assert!(program.is_valid(), "{:?}", program.diagnostics());
        let text = Printer::default().print(&program);
        assert!(text.contains("fn accumulate(n : i32) -> i32 {"), "{}", text);
        assert!(text.contains("clamp("));
    }
}
