//! Pruebas del generador de código: se compila una unidad completa y se
//! inspecciona el ensamblador emitido.

use compiler::error::Report;
use compiler::{codegen, parse, symtab, typecheck};

/// Corre la unidad por todo el compilador y devuelve el ensamblador.
fn compile(source: &str) -> String {
    let mut report = Report::new();
    let mut ast = parse::parse(source, &mut report);
    assert_eq!(report.error_count(), 0, "{}", report);

    let mut scopes = symtab::collect(&ast);
    typecheck::decorate(&mut ast, &scopes, &mut report);
    assert_eq!(report.error_count(), 0, "{}", report);

    let mut output = Vec::new();
    codegen::generate(&ast, &mut scopes, &mut output).expect("write failed");

    String::from_utf8(output).expect("non utf-8 output")
}

fn offset(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("`{}' not found in:\n{}", needle, haystack))
}

#[test]
fn globals_become_data_records() {
    let output = compile(
        "module datos;\n\
         \n\
         int counter = 7;\n\
         char letter = 'a';\n\
         float ratio = 1.5;\n\
         \n\
         start main: void -> void\n\
         {\n\
         }\n",
    );

    assert!(offset(&output, ".data") < offset(&output, ".text"));

    assert!(output.contains(".globl counter"));
    assert!(output.contains("counter,@object"));
    assert!(output.contains("counter,4"));
    assert!(output.contains("counter:"));
    assert!(output.contains(".long   7"));

    assert!(output.contains("letter,1"));
    assert!(output.contains(".byte   97"));

    // Los float se almacenan como sus bits IEEE-754.
    assert!(output.contains(&format!(".long   {}", 1.5f32.to_bits())));
}

#[test]
fn uninitialized_globals_default_to_zero() {
    let output = compile(
        "module datos;\n\
         \n\
         int vacio;\n\
         \n\
         start main: void -> void\n\
         {\n\
         }\n",
    );

    assert!(output.contains("vacio:"));
    assert!(output.contains(".long   0"));
}

#[test]
fn frame_reserves_one_byte_per_char_and_four_per_int() {
    let output = compile(
        "module marco;\n\
         \n\
         start main: void -> void\n\
         {\n\
         \tint a = 5;\n\
         \tint b;\n\
         \tchar c;\n\
         \tb = a;\n\
         }\n",
    );

    assert!(output.contains("$9, %esp"));

    // La primera local queda debajo del bloque salvado por pusha.
    assert!(output.contains("$5, -36(%ebp)"));
    assert!(output.contains("%eax, -40(%ebp)"));
}

#[test]
fn parameters_sit_above_the_frame_link() {
    let output = compile(
        "module marco;\n\
         \n\
         g: int a, b -> int\n\
         {\n\
         \treturn( b );\n\
         }\n",
    );

    // Dos palabras de enlace: el segundo parámetro vive en 12(%ebp).
    assert!(output.contains("$12, %ecx"));
}

#[test]
fn while_loops_test_at_the_top_and_jump_back() {
    let output = compile(
        "module lazo;\n\
         \n\
         start main: void -> void\n\
         {\n\
         \tint i;\n\
         \twhile( i < 3 ) do\n\
         \t{\n\
         \t\ti = i + 1;\n\
         \t}\n\
         }\n",
    );

    // El epílogo consume .L3; el lazo toma .L4 y .L5.
    assert!(output.contains(".L4:"));
    assert!(output.contains(".L5:"));
    assert!(!output.contains(".L6"));

    assert!(offset(&output, ".L4:") < offset(&output, "$0, %eax"));
    assert!(offset(&output, "je      .L5") < offset(&output, "jmp     .L4"));
    assert!(offset(&output, "jmp     .L4") < offset(&output, ".L5:"));
}

#[test]
fn comparisons_use_conditional_moves() {
    let output = compile(
        "module compara;\n\
         \n\
         start main: void -> void\n\
         {\n\
         \tint a;\n\
         \tbool b;\n\
         \tb = a < 2;\n\
         }\n",
    );

    assert!(output.contains("cmpl    %eax, %ebx"));
    assert!(output.contains("$0, %ebx"));
    assert!(output.contains("$1, %ecx"));
    assert!(output.contains("cmovnl  %ebx, %eax"));
    assert!(output.contains("cmovl   %ecx, %eax"));
}

#[test]
fn division_clears_edx_and_modulus_keeps_it() {
    let output = compile(
        "module divide;\n\
         \n\
         start main: void -> void\n\
         {\n\
         \tint a, b, q, r;\n\
         \tq = a / b;\n\
         \tr = a % b;\n\
         }\n",
    );

    assert!(output.contains("xchgl   %eax, %ebx"));
    assert!(output.contains("xorl    %edx, %edx"));
    assert!(output.contains("idiv    %ebx"));
    assert!(output.contains("%edx, %eax"));
}

#[test]
fn shift_counts_travel_through_cl() {
    let output = compile(
        "module corre;\n\
         \n\
         start main: void -> void\n\
         {\n\
         \tint a, b;\n\
         \tb = a << 2;\n\
         \tb = a >> 2;\n\
         }\n",
    );

    assert!(output.contains("movl    %eax, %ecx"));
    assert!(output.contains("xchgl   %eax, %ecx"));
    assert!(output.contains("sall    %cl, %eax"));
    assert!(output.contains("sarl    %cl, %eax"));
}

#[test]
fn arguments_push_right_to_left_and_the_caller_cleans_up() {
    let output = compile(
        "module llamada;\n\
         \n\
         g: int a, b -> int\n\
         {\n\
         \treturn( a );\n\
         }\n\
         \n\
         start main: void -> void\n\
         {\n\
         \tint r;\n\
         \tr = g( 1, 2 );\n\
         }\n",
    );

    assert!(offset(&output, "$2, %eax") < offset(&output, "$1, %eax"));
    assert!(output.contains("call    g"));
    assert!(output.contains("addl    $8, %esp"));
}

#[test]
fn return_jumps_to_the_shared_epilogue() {
    let output = compile(
        "module salida;\n\
         \n\
         f: int a -> int\n\
         {\n\
         \tif( a > 0 )\n\
         \t{\n\
         \t\treturn( 1 );\n\
         \t}\n\
         \treturn( 0 );\n\
         }\n",
    );

    // Dos saltos al epílogo y la definición de su etiqueta.
    assert_eq!(output.matches("jmp     .L3").count(), 2);
    assert!(output.contains(".L3:"));
    assert!(output.contains("%eax, -4(%ebp)"));
    assert!(output.contains("popa"));
    assert!(output.contains("leave"));
}

#[test]
fn label_numbering_restarts_for_each_unit() {
    let source = "module lazo;\n\
                  \n\
                  start main: void -> void\n\
                  {\n\
                  \tint i;\n\
                  \twhile( i < 3 ) do\n\
                  \t{\n\
                  \t\ti = i + 1;\n\
                  \t}\n\
                  }\n";

    assert_eq!(compile(source), compile(source));
}

#[test]
fn switch_compares_the_selector_against_each_case() {
    let output = compile(
        "module casos;\n\
         \n\
         start main: void -> void\n\
         {\n\
         \tint a;\n\
         \tswitch( a )\n\
         \t{\n\
         \t\tcase 1 { a = 10; }\n\
         \t\tcase 2 { a = 20; }\n\
         \t\tdefault { a = 0; }\n\
         \t}\n\
         }\n",
    );

    assert!(output.contains("%eax, %ebx"));
    assert!(output.contains("cmpl    $1, %ebx"));
    assert!(output.contains("cmpl    $2, %ebx"));
    assert!(offset(&output, "cmpl    $1, %ebx") < offset(&output, "cmpl    $2, %ebx"));
}

#[test]
fn stores_through_a_pointer_target() {
    let output = compile(
        "module punteros;\n\
         \n\
         start main: void -> void\n\
         {\n\
         \tint a;\n\
         \tint *p;\n\
         \tp = &a;\n\
         \ta = 1;\n\
         \t*p = 7;\n\
         }\n",
    );

    // &a toma la dirección del primer local, bajo los registros salvados.
    assert!(output.contains("addl    $-36, %eax"));

    // El valor espera en la pila mientras se resuelve la dirección; el
    // almacén final es indirecto por %ecx.
    assert!(output.contains("pushl   %eax"));
    assert!(output.contains("popl    %eax"));
    assert!(output.contains("movl    %eax, (%ecx)"));
    assert!(offset(&output, "pushl   %eax") < offset(&output, "movl    %eax, (%ecx)"));
}

#[test]
fn break_and_continue_target_the_loop_labels() {
    let output = compile(
        "module saltos;\n\
         \n\
         start main: void -> void\n\
         {\n\
         \tint i;\n\
         \twhile( i < 9 ) do\n\
         \t{\n\
         \t\tif( i == 3 )\n\
         \t\t{\n\
         \t\t\tcontinue;\n\
         \t\t}\n\
         \t\tif( i == 5 )\n\
         \t\t{\n\
         \t\t\tbreak;\n\
         \t\t}\n\
         \t\ti = i + 1;\n\
         \t}\n\
         }\n",
    );

    // El lazo ocupa .L4 (cabecera) y .L5 (salida). continue salta a la
    // cabecera igual que el salto de cierre; break salta a la salida.
    assert_eq!(output.matches("jmp     .L4").count(), 2);
    assert_eq!(output.matches("jmp     .L5").count(), 1);
    assert!(offset(&output, "jmp     .L5") < offset(&output, ".L5:"));
}
