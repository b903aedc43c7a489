//! Generación de código x86 de 32 bits en sintaxis AT&T para GNU as.
//!
//! Dos pasadas sobre la unidad: la sección `.data` con un registro por
//! variable global, y la sección `.text` con el código de cada función
//! definida. Toda expresión deja su resultado en `%eax`; `%ebx` conserva
//! el operando izquierdo de una operación binaria, `%ecx` presta `%cl`
//! para los desplazamientos y la constante de las comparaciones, y `%edx`
//! se pone a cero antes de dividir. El prólogo salva todos los registros
//! con `pusha`; el valor de retorno se escribe sobre la copia salvada de
//! `%eax` para que `popa` lo restaure.
//!
//! Esta fase no valida nada: asume un árbol decorado que pasó todas las
//! verificaciones sin errores.

use crate::ast::{Ast, NodeId, NodeKind};
use crate::lex::Lexeme;
use crate::symtab::{Resolved, ScopeTree, ScopeWalker};
use crate::types::{Modifiers, SimpleType};
use std::io::{self, Write};

/// Primer número de etiqueta `.L<n>` de cada unidad.
const LABEL_BASE: u32 = 3;

/// Bytes que ocupa el bloque de registros salvado por `pusha`.
const PUSHA_BYTES: u32 = 32;

/// Escribe el ensamblador de la unidad completa en `output`.
pub fn generate<W: Write>(ast: &Ast, scopes: &mut ScopeTree, output: &mut W) -> io::Result<()> {
    let root = match ast.root() {
        Some(root) => root,
        None => return Ok(()),
    };

    let mut generator = Generator {
        ast,
        scopes,
        output,
        walker: ScopeWalker::new(),
        labels: LABEL_BASE,
        loops: Vec::new(),
        epilogue: String::new(),
    };

    writeln!(generator.output, ".data")?;
    generator.data_section(root)?;

    writeln!(generator.output, ".text")?;
    emit!(generator, ".align 4")?;
    generator.node(root)?;

    Ok(())
}

struct Generator<'a, W> {
    ast: &'a Ast,
    scopes: &'a mut ScopeTree,
    output: &'a mut W,
    walker: ScopeWalker,
    labels: u32,
    /// Etiquetas (inicio, salida) de los lazos que encierran al nodo
    /// actual, para `continue` y `break`.
    loops: Vec<(String, String)>,
    /// Etiqueta del epílogo de la función en curso.
    epilogue: String,
}

impl<'a, W: Write> Generator<'a, W> {
    fn output(&mut self) -> &mut W {
        self.output
    }

    fn fresh_label(&mut self) -> String {
        let label = format!(".L{}", self.labels);
        self.labels += 1;
        label
    }

    // Sección de datos.

    fn data_section(&mut self, root: NodeId) -> io::Result<()> {
        for &global in self.ast.children(root) {
            if self.ast.kind(global) != NodeKind::Global {
                continue;
            }

            for &child in self.ast.children(global) {
                if self.ast.kind(child) != NodeKind::DeclBlock {
                    continue;
                }

                for &declaration in self.ast.children(child) {
                    if self.ast.kind(declaration) == NodeKind::Declaration {
                        self.global_declaration(declaration)?;
                    }
                }
            }
        }

        Ok(())
    }

    fn global_declaration(&mut self, node: NodeId) -> io::Result<()> {
        let name = self.node_name(self.ast.child(node, 2));
        let resolved = match self.scopes.lookup(ScopeTree::ROOT, &name) {
            Some(resolved) => resolved,
            None => return Ok(()),
        };

        let typ = self.scopes.symbol(resolved).first_type().clone();

        // Lo externo se define en otra unidad.
        if typ.modifiers.contains(Modifiers::EXTERN) {
            return Ok(());
        }

        let word = typ.is_pointer()
            || matches!(typ.simple, SimpleType::Int | SimpleType::Float);
        let size = if word { 4 } else { 1 };

        let value = self
            .ast
            .children(node)
            .get(4)
            .and_then(|&initializer| self.ast.children(initializer).first())
            .and_then(|&literal| self.literal_value(literal))
            .unwrap_or(0);

        writeln!(self.output, ".globl {}", name)?;
        emit!(self, ".align 4")?;
        emit!(self, ".type", "{},@object", name)?;
        emit!(self, ".size", "{},{}", name, size)?;
        writeln!(self.output, "{}:", name)?;

        if word {
            emit!(self, ".long", "{}", value)?;
        } else {
            emit!(self, ".byte", "{}", value)?;
        }

        Ok(())
    }

    // Sección de código.

    fn node(&mut self, node: NodeId) -> io::Result<()> {
        match self.ast.kind(node) {
            NodeKind::Function => {
                if self.ast.children(node).len() > 1 {
                    self.function(node)?;
                }

                Ok(())
            }
            // El marco ya reservó e inicializó las locales.
            NodeKind::Declaration => Ok(()),
            NodeKind::Block => {
                self.walker.enter(self.scopes);

                for &child in &self.ast.children(node).to_vec() {
                    self.node(child)?;
                }

                self.walker.exit();
                Ok(())
            }
            NodeKind::Application => self.application(node),
            NodeKind::If => self.conditional(node),
            NodeKind::While => self.while_loop(node),
            NodeKind::Switch => self.switch(node),
            NodeKind::Break => {
                if let Some((_, exit)) = self.loops.last().cloned() {
                    emit!(self, "jmp", "{}", exit)?;
                }

                Ok(())
            }
            NodeKind::Continue => {
                if let Some((top, _)) = self.loops.last().cloned() {
                    emit!(self, "jmp", "{}", top)?;
                }

                Ok(())
            }
            NodeKind::Return => {
                if let Some(&value) = self.ast.children(node).first() {
                    self.node(value)?;
                }

                let epilogue = self.epilogue.clone();
                emit!(self, "jmp", "{}", epilogue)
            }
            NodeKind::Assign => self.assign(node),
            NodeKind::LitInt | NodeKind::LitBool | NodeKind::LitChar | NodeKind::LitFloat => {
                let value = self.literal_value(node).unwrap_or(0);
                emit!(self, "movl", "${}, %eax", value)
            }
            NodeKind::LitIdentifier => self.load_identifier(node),
            NodeKind::UnaryAdd
            | NodeKind::UnarySubtract
            | NodeKind::Not
            | NodeKind::BitwiseComplement
            | NodeKind::Dereference
            | NodeKind::Address
            | NodeKind::IntToFloat
            | NodeKind::CharToInt
            | NodeKind::CharToFloat => self.unary(node),
            kind if binary_kind(kind) => self.binary(node),
            _ => {
                for &child in &self.ast.children(node).to_vec() {
                    self.node(child)?;
                }

                Ok(())
            }
        }
    }

    fn function(&mut self, node: NodeId) -> io::Result<()> {
        let header = self.ast.child(node, 0);
        let body = self.ast.child(node, 1);
        let name = self.node_name(self.ast.child(header, 1));

        writeln!(self.output, ".globl {}", name)?;
        emit!(self, ".type", "{},@function", name)?;
        writeln!(self.output, "{}:", name)?;
        emit!(self, "pushl", "%ebp")?;
        emit!(self, "movl", "%esp, %ebp")?;
        emit!(self, "pusha")?;

        self.walker.enter(self.scopes);

        // Desplazamientos de locales y parámetros, antes de emitir cuerpo.
        // El bloque superior comparte el ámbito de la función, así que se
        // recorren sus hijos directamente.
        let mut layout = self.walker.clone();
        let mut local_bytes = 0;
        for &child in &self.ast.children(body).to_vec() {
            local_bytes = self.layout_locals(&mut layout, child, local_bytes);
        }
        emit!(self, "subl", "${}, %esp", local_bytes)?;

        self.assign_parameter_locations(header);

        let mut init = self.walker.clone();
        for &child in &self.ast.children(body).to_vec() {
            self.initialize_locals(&mut init, child)?;
        }

        let epilogue = self.fresh_label();
        let saved = std::mem::replace(&mut self.epilogue, epilogue.clone());

        // El bloque superior comparte el ámbito de la función.
        for &child in &self.ast.children(body).to_vec() {
            self.node(child)?;
        }

        self.walker.exit();
        self.epilogue = saved;

        // El valor de retorno pisa la copia de %eax que salvó pusha.
        writeln!(self.output, "{}:", epilogue)?;
        emit!(self, "movl", "%eax, -4(%ebp)")?;
        emit!(self, "movl", "%ebp, %esp")?;
        emit!(self, "subl", "${}, %esp", PUSHA_BYTES)?;
        emit!(self, "popa")?;
        emit!(self, "leave")?;
        emit!(self, "ret")?;
        writeln!(self.output)?;

        Ok(())
    }

    /// Asigna a cada local su desplazamiento negativo respecto de `%ebp`
    /// y devuelve el total de bytes a reservar: 4 por int o float, 1 por
    /// char o bool, en orden de declaración y entrando a los bloques
    /// anidados.
    fn layout_locals(&mut self, walker: &mut ScopeWalker, node: NodeId, mut count: u32) -> u32 {
        match self.ast.kind(node) {
            NodeKind::Declaration => {
                let name = self.node_name(self.ast.child(node, 2));

                if let Some(resolved) = self.scopes.lookup(walker.current(), &name) {
                    let simple = self.scopes.symbol(resolved).first_type().simple;

                    // Las locales viven debajo del bloque de registros
                    // salvado por pusha.
                    self.scopes.symbol_mut(resolved).location =
                        Some(-((PUSHA_BYTES + count + 4) as i32));
                    count += match simple {
                        SimpleType::Char | SimpleType::Boolean => 1,
                        _ => 4,
                    };
                }

                count
            }
            NodeKind::Block => {
                walker.enter(self.scopes);

                for &child in &self.ast.children(node).to_vec() {
                    count = self.layout_locals(walker, child, count);
                }

                walker.exit();
                count
            }
            _ => {
                for &child in &self.ast.children(node).to_vec() {
                    count = self.layout_locals(walker, child, count);
                }

                count
            }
        }
    }

    fn assign_parameter_locations(&mut self, header: NodeId) {
        let param_list = self.ast.child(header, 2);
        let params: Vec<NodeId> = self
            .ast
            .children(param_list)
            .iter()
            .copied()
            .filter(|&child| self.ast.kind(child) == NodeKind::Param)
            .collect();

        for (index, param) in params.into_iter().enumerate() {
            let name = self.node_name(self.ast.child(param, 2));

            if let Some(resolved) = self.scopes.lookup(self.walker.current(), &name) {
                // Dos palabras de enlace: retorno y %ebp salvado.
                self.scopes.symbol_mut(resolved).location = Some(((index + 2) * 4) as i32);
            }
        }
    }

    /// Emite las cargas iniciales de las locales con inicializador
    /// constante.
    fn initialize_locals(&mut self, walker: &mut ScopeWalker, node: NodeId) -> io::Result<()> {
        match self.ast.kind(node) {
            NodeKind::Declaration => {
                let value = self
                    .ast
                    .children(node)
                    .get(4)
                    .and_then(|&initializer| self.ast.children(initializer).first())
                    .and_then(|&literal| self.literal_value(literal));

                let value = match value {
                    Some(value) => value,
                    None => return Ok(()),
                };

                let name = self.node_name(self.ast.child(node, 2));
                if let Some(resolved) = self.scopes.lookup(walker.current(), &name) {
                    let location = self.scopes.symbol(resolved).location.unwrap_or(0);
                    emit!(self, "movl", "${}, {}(%ebp)", value, location)?;
                }

                Ok(())
            }
            NodeKind::Block => {
                walker.enter(self.scopes);

                for &child in &self.ast.children(node).to_vec() {
                    self.initialize_locals(walker, child)?;
                }

                walker.exit();
                Ok(())
            }
            _ => {
                for &child in &self.ast.children(node).to_vec() {
                    self.initialize_locals(walker, child)?;
                }

                Ok(())
            }
        }
    }

    // Sentencias.

    fn conditional(&mut self, node: NodeId) -> io::Result<()> {
        let children = self.ast.children(node).to_vec();

        self.node(children[0])?;
        emit!(self, "cmpl", "$0, %eax")?;

        let skip = self.fresh_label();

        if children.len() == 2 {
            emit!(self, "je", "{}", skip)?;
            self.node(children[1])?;
            writeln!(self.output, "{}:", skip)?;
        } else {
            let done = self.fresh_label();

            emit!(self, "je", "{}", skip)?;
            self.node(children[1])?;
            emit!(self, "jmp", "{}", done)?;
            writeln!(self.output, "{}:", skip)?;
            self.node(children[2])?;
            writeln!(self.output, "{}:", done)?;
        }

        Ok(())
    }

    fn while_loop(&mut self, node: NodeId) -> io::Result<()> {
        let condition = self.ast.child(node, 0);
        let body = self.ast.child(node, 1);

        let top = self.fresh_label();
        writeln!(self.output, "{}:", top)?;

        self.node(condition)?;
        emit!(self, "cmpl", "$0, %eax")?;

        let exit = self.fresh_label();
        emit!(self, "je", "{}", exit)?;

        self.loops.push((top.clone(), exit.clone()));
        self.node(body)?;
        self.loops.pop();

        emit!(self, "jmp", "{}", top)?;
        writeln!(self.output, "{}:", exit)?;

        Ok(())
    }

    fn switch(&mut self, node: NodeId) -> io::Result<()> {
        let selector = self.ast.child(node, 0);
        let cases = self.ast.children(self.ast.child(node, 1)).to_vec();
        let default = self.ast.child(node, 2);

        self.node(selector)?;
        emit!(self, "movl", "%eax, %ebx")?;

        let labels: Vec<String> = cases.iter().map(|_| self.fresh_label()).collect();
        let default_label = self.fresh_label();
        let end = self.fresh_label();

        for (&case, label) in cases.iter().zip(&labels) {
            let value = self.literal_value(case).unwrap_or(0);
            emit!(self, "cmpl", "${}, %ebx", value)?;
            emit!(self, "je", "{}", label)?;
        }

        emit!(self, "jmp", "{}", default_label)?;

        for (&case, label) in cases.iter().zip(&labels) {
            writeln!(self.output, "{}:", label)?;
            self.node(self.ast.child(case, 0))?;
            emit!(self, "jmp", "{}", end)?;
        }

        writeln!(self.output, "{}:", default_label)?;
        self.node(default)?;
        writeln!(self.output, "{}:", end)?;

        Ok(())
    }

    fn assign(&mut self, node: NodeId) -> io::Result<()> {
        let target = self.ast.child(node, 0);
        let value = self.ast.child(node, 1);

        self.node(value)?;

        match self.ast.kind(target) {
            NodeKind::LitIdentifier => {
                let name = self.node_name(target);
                let resolved = match self.resolve(&name) {
                    Some(resolved) => resolved,
                    None => return Ok(()),
                };

                if resolved.global {
                    emit!(self, "movl", "%eax, {}", name)
                } else {
                    let location = self.scopes.symbol(resolved).location.unwrap_or(0);
                    emit!(self, "movl", "%eax, {}(%ebp)", location)
                }
            }
            NodeKind::Dereference => {
                // El valor espera en la pila mientras se calcula la
                // dirección destino.
                emit!(self, "pushl", "%eax")?;
                self.node(self.ast.child(target, 0))?;
                emit!(self, "movl", "%eax, %ecx")?;
                emit!(self, "popl", "%eax")?;
                emit!(self, "movl", "%eax, (%ecx)")
            }
            _ => Ok(()),
        }
    }

    // Expresiones.

    fn load_identifier(&mut self, node: NodeId) -> io::Result<()> {
        let name = self.node_name(node);
        let resolved = match self.resolve(&name) {
            Some(resolved) => resolved,
            None => return Ok(()),
        };

        if resolved.global {
            emit!(self, "movl", "{}, %eax", name)
        } else {
            let location = self.scopes.symbol(resolved).location.unwrap_or(0);
            emit!(self, "movl", "%ebp, %ecx")?;
            emit!(self, "addl", "${}, %ecx", location)?;
            emit!(self, "movl", "(%ecx), %eax")
        }
    }

    fn unary(&mut self, node: NodeId) -> io::Result<()> {
        let child = self.ast.child(node, 0);

        if self.ast.kind(node) == NodeKind::Address {
            return self.load_address(child);
        }

        self.node(child)?;

        match self.ast.kind(node) {
            NodeKind::UnarySubtract => emit!(self, "neg", "%eax"),
            NodeKind::BitwiseComplement => emit!(self, "notl", "%eax"),
            NodeKind::Not => {
                emit!(self, "cmpl", "$0, %eax")?;
                emit!(self, "movl", "$0, %ebx")?;
                emit!(self, "movl", "$1, %ecx")?;
                emit!(self, "cmovne", "%ebx, %eax")?;
                emit!(self, "cmove", "%ecx, %eax")
            }
            NodeKind::Dereference => emit!(self, "movl", "(%eax), %eax"),
            // Conversión sin efecto en registro: el valor ya ocupa los
            // 32 bits de %eax.
            _ => Ok(()),
        }
    }

    fn load_address(&mut self, node: NodeId) -> io::Result<()> {
        if self.ast.kind(node) != NodeKind::LitIdentifier {
            return self.node(node);
        }

        let name = self.node_name(node);
        let resolved = match self.resolve(&name) {
            Some(resolved) => resolved,
            None => return Ok(()),
        };

        if resolved.global {
            emit!(self, "movl", "${}, %eax", name)
        } else {
            let location = self.scopes.symbol(resolved).location.unwrap_or(0);
            emit!(self, "movl", "%ebp, %eax")?;
            emit!(self, "addl", "${}, %eax", location)
        }
    }

    fn binary(&mut self, node: NodeId) -> io::Result<()> {
        let kind = self.ast.kind(node);
        let left = self.ast.child(node, 0);
        let right = self.ast.child(node, 1);

        self.node(left)?;

        // Los desplazamientos toman la cuenta por %cl.
        if matches!(kind, NodeKind::BitwiseLShift | NodeKind::BitwiseRShift) {
            emit!(self, "movl", "%eax, %ecx")?;
            self.node(right)?;
            emit!(self, "xchgl", "%eax, %ecx")?;

            return match kind {
                NodeKind::BitwiseLShift => emit!(self, "sall", "%cl, %eax"),
                _ => emit!(self, "sarl", "%cl, %eax"),
            };
        }

        emit!(self, "movl", "%eax, %ebx")?;
        self.node(right)?;

        match kind {
            NodeKind::BinaryAdd => emit!(self, "addl", "%ebx, %eax"),
            NodeKind::BinarySubtract => {
                emit!(self, "xchgl", "%eax, %ebx")?;
                emit!(self, "subl", "%ebx, %eax")
            }
            NodeKind::Multiply => emit!(self, "imul", "%ebx"),
            NodeKind::Divide => {
                emit!(self, "xchgl", "%eax, %ebx")?;
                emit!(self, "xorl", "%edx, %edx")?;
                emit!(self, "idiv", "%ebx")
            }
            NodeKind::Modulus => {
                emit!(self, "xchgl", "%eax, %ebx")?;
                emit!(self, "xorl", "%edx, %edx")?;
                emit!(self, "idiv", "%ebx")?;
                emit!(self, "movl", "%edx, %eax")
            }
            NodeKind::BitwiseAnd | NodeKind::LogicalAnd => emit!(self, "andl", "%ebx, %eax"),
            NodeKind::BitwiseOr | NodeKind::LogicalOr => emit!(self, "orl", "%ebx, %eax"),
            NodeKind::BitwiseXor => emit!(self, "xorl", "%ebx, %eax"),
            _ => self.comparison(kind),
        }
    }

    /// Idioma sin saltos: se comparan los operandos y se mueve 0 o 1 a
    /// `%eax` según la condición.
    fn comparison(&mut self, kind: NodeKind) -> io::Result<()> {
        emit!(self, "cmpl", "%eax, %ebx")?;
        emit!(self, "movl", "$0, %ebx")?;
        emit!(self, "movl", "$1, %ecx")?;

        let (miss, hit) = match kind {
            NodeKind::Equal => ("cmovne", "cmove"),
            NodeKind::NotEqual => ("cmove", "cmovne"),
            NodeKind::Less => ("cmovnl", "cmovl"),
            NodeKind::LessEqual => ("cmovnle", "cmovle"),
            NodeKind::Greater => ("cmovng", "cmovg"),
            _ => ("cmovnge", "cmovge"),
        };

        emit!(self, miss, "%ebx, %eax")?;
        emit!(self, hit, "%ecx, %eax")
    }

    /// Convención de llamada C: argumentos de derecha a izquierda, el
    /// llamador repone la pila.
    fn application(&mut self, node: NodeId) -> io::Result<()> {
        let callee = self.ast.child(node, 0);
        let args = self.ast.children(self.ast.child(node, 1)).to_vec();

        for &arg in args.iter().rev() {
            self.node(arg)?;
            emit!(self, "pushl", "%eax")?;
        }

        let name = self.node_name(callee);
        emit!(self, "call", "{}", name)?;

        if !args.is_empty() {
            emit!(self, "addl", "${}, %esp", args.len() * 4)?;
        }

        Ok(())
    }

    // Auxiliares.

    fn resolve(&self, name: &str) -> Option<Resolved> {
        self.scopes.lookup(self.walker.current(), name)
    }

    fn node_name(&self, node: NodeId) -> String {
        self.ast
            .node(node)
            .value
            .as_ref()
            .and_then(|value| value.as_ident())
            .unwrap_or_default()
            .to_string()
    }

    /// Representación de 32 bits de un literal: los float viajan como sus
    /// bits IEEE-754.
    fn literal_value(&self, node: NodeId) -> Option<u32> {
        match self.ast.node(node).value.as_ref()? {
            Lexeme::Uint(value) => Some(*value),
            Lexeme::Bool(value) => Some(*value as u32),
            Lexeme::Char(value) => Some(*value as u32),
            Lexeme::Float(value) => Some(value.to_bits()),
            _ => None,
        }
    }
}

fn binary_kind(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::BinaryAdd
            | NodeKind::BinarySubtract
            | NodeKind::Multiply
            | NodeKind::Divide
            | NodeKind::Modulus
            | NodeKind::BitwiseAnd
            | NodeKind::BitwiseOr
            | NodeKind::BitwiseXor
            | NodeKind::BitwiseLShift
            | NodeKind::BitwiseRShift
            | NodeKind::LogicalAnd
            | NodeKind::LogicalOr
            | NodeKind::Equal
            | NodeKind::NotEqual
            | NodeKind::Less
            | NodeKind::LessEqual
            | NodeKind::Greater
            | NodeKind::GreaterEqual
    )
}
