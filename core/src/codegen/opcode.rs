/// Operand-count class an opcode number is looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    TwoOp,
    OneOp,
    ZeroOp,
    Var,
    Ext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // 2OP
    Je,
    Jl,
    Jg,
    DecChk,
    IncChk,
    Jin,
    Test,
    Or,
    And,
    TestAttr,
    SetAttr,
    ClearAttr,
    Store,
    InsertObj,
    Loadw,
    Loadb,
    GetProp,
    GetPropAddr,
    GetNextProp,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Call2s,
    Call2n,
    SetColour,
    Throw,
    // 1OP
    Jz,
    GetSibling,
    GetChild,
    GetParent,
    GetPropLen,
    Inc,
    Dec,
    PrintAddr,
    Call1s,
    RemoveObj,
    PrintObj,
    Ret,
    Jump,
    PrintPaddr,
    Load,
    Call1n,
    // 0OP
    Rtrue,
    Rfalse,
    Print,
    PrintRet,
    Nop,
    Restart,
    RetPopped,
    Catch,
    Quit,
    NewLine,
    Verify,
    Piracy,
    // VAR
    CallVs,
    Storew,
    Storeb,
    PutProp,
    Aread,
    PrintChar,
    PrintNum,
    Random,
    Push,
    Pull,
    SplitWindow,
    SetWindow,
    CallVs2,
    EraseWindow,
    EraseLine,
    SetCursor,
    GetCursor,
    SetTextStyle,
    BufferMode,
    OutputStream,
    InputStream,
    SoundEffect,
    ReadChar,
    ScanTable,
    Not,
    CallVn,
    CallVn2,
    Tokenise,
    EncodeText,
    CopyTable,
    PrintTable,
    CheckArgCount,
    // EXT
    Save,
    Restore,
    LogShift,
    ArtShift,
    SetFont,
    SaveUndo,
    RestoreUndo,
    PrintUnicode,
    CheckUnicode,
}

impl Opcode {
    /// Opcode table for versions 5 and 8.
    pub fn lookup(class: OpClass, number: u8) -> Option<Opcode> {
        use Opcode::*;
        let op = match class {
            OpClass::TwoOp => match number {
                1 => Je,
                2 => Jl,
                3 => Jg,
                4 => DecChk,
                5 => IncChk,
                6 => Jin,
                7 => Test,
                8 => Or,
                9 => And,
                10 => TestAttr,
                11 => SetAttr,
                12 => ClearAttr,
                13 => Store,
                14 => InsertObj,
                15 => Loadw,
                16 => Loadb,
                17 => GetProp,
                18 => GetPropAddr,
                19 => GetNextProp,
                20 => Add,
                21 => Sub,
                22 => Mul,
                23 => Div,
                24 => Mod,
                25 => Call2s,
                26 => Call2n,
                27 => SetColour,
                28 => Throw,
                _ => return None,
            },
            OpClass::OneOp => match number {
                0 => Jz,
                1 => GetSibling,
                2 => GetChild,
                3 => GetParent,
                4 => GetPropLen,
                5 => Inc,
                6 => Dec,
                7 => PrintAddr,
                8 => Call1s,
                9 => RemoveObj,
                10 => PrintObj,
                11 => Ret,
                12 => Jump,
                13 => PrintPaddr,
                14 => Load,
                15 => Call1n,
                _ => return None,
            },
            OpClass::ZeroOp => match number {
                0 => Rtrue,
                1 => Rfalse,
                2 => Print,
                3 => PrintRet,
                4 => Nop,
                7 => Restart,
                8 => RetPopped,
                9 => Catch,
                10 => Quit,
                11 => NewLine,
                13 => Verify,
                15 => Piracy,
                _ => return None,
            },
            OpClass::Var => match number {
                0 => CallVs,
                1 => Storew,
                2 => Storeb,
                3 => PutProp,
                4 => Aread,
                5 => PrintChar,
                6 => PrintNum,
                7 => Random,
                8 => Push,
                9 => Pull,
                10 => SplitWindow,
                11 => SetWindow,
                12 => CallVs2,
                13 => EraseWindow,
                14 => EraseLine,
                15 => SetCursor,
                16 => GetCursor,
                17 => SetTextStyle,
                18 => BufferMode,
                19 => OutputStream,
                20 => InputStream,
                21 => SoundEffect,
                22 => ReadChar,
                23 => ScanTable,
                24 => Not,
                25 => CallVn,
                26 => CallVn2,
                27 => Tokenise,
                28 => EncodeText,
                29 => CopyTable,
                30 => PrintTable,
                31 => CheckArgCount,
                _ => return None,
            },
            OpClass::Ext => match number {
                0 => Save,
                1 => Restore,
                2 => LogShift,
                3 => ArtShift,
                4 => SetFont,
                9 => SaveUndo,
                10 => RestoreUndo,
                11 => PrintUnicode,
                12 => CheckUnicode,
                _ => return None,
            },
        };
        Some(op)
    }

    pub fn stores(self) -> bool {
        use Opcode::*;
        matches!(
            self,
            Or | And
                | Loadw
                | Loadb
                | GetProp
                | GetPropAddr
                | GetNextProp
                | Add
                | Sub
                | Mul
                | Div
                | Mod
                | Call2s
                | GetSibling
                | GetChild
                | GetParent
                | GetPropLen
                | Call1s
                | Load
                | Catch
                | CallVs
                | Aread
                | Random
                | CallVs2
                | ReadChar
                | ScanTable
                | Not
                | Save
                | Restore
                | LogShift
                | ArtShift
                | SetFont
                | SaveUndo
                | RestoreUndo
                | CheckUnicode
        )
    }

    pub fn branches(self) -> bool {
        use Opcode::*;
        matches!(
            self,
            Je | Jl
                | Jg
                | DecChk
                | IncChk
                | Jin
                | Test
                | TestAttr
                | Jz
                | GetSibling
                | GetChild
                | Verify
                | Piracy
                | ScanTable
                | CheckArgCount
        )
    }

    #[inline]
    pub fn has_text(self) -> bool {
        matches!(self, Opcode::Print | Opcode::PrintRet)
    }

    /// Whether execution may leave the straight-line sequence after this instruction.
    pub fn ends_unit(self) -> bool {
        use Opcode::*;
        self.branches()
            || matches!(
                self,
                Jump | Call2s
                    | Call2n
                    | Call1s
                    | Call1n
                    | CallVs
                    | CallVs2
                    | CallVn
                    | CallVn2
                    | Ret
                    | Rtrue
                    | Rfalse
                    | PrintRet
                    | RetPopped
                    | Throw
                    | Restart
                    | Quit
                    | Aread
                    | ReadChar
                    | Save
                    | Restore
                    | SaveUndo
                    | RestoreUndo
            )
    }

    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            Je => "je",
            Jl => "jl",
            Jg => "jg",
            DecChk => "dec_chk",
            IncChk => "inc_chk",
            Jin => "jin",
            Test => "test",
            Or => "or",
            And => "and",
            TestAttr => "test_attr",
            SetAttr => "set_attr",
            ClearAttr => "clear_attr",
            Store => "store",
            InsertObj => "insert_obj",
            Loadw => "loadw",
            Loadb => "loadb",
            GetProp => "get_prop",
            GetPropAddr => "get_prop_addr",
            GetNextProp => "get_next_prop",
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Mod => "mod",
            Call2s => "call_2s",
            Call2n => "call_2n",
            SetColour => "set_colour",
            Throw => "throw",
            Jz => "jz",
            GetSibling => "get_sibling",
            GetChild => "get_child",
            GetParent => "get_parent",
            GetPropLen => "get_prop_len",
            Inc => "inc",
            Dec => "dec",
            PrintAddr => "print_addr",
            Call1s => "call_1s",
            RemoveObj => "remove_obj",
            PrintObj => "print_obj",
            Ret => "ret",
            Jump => "jump",
            PrintPaddr => "print_paddr",
            Load => "load",
            Call1n => "call_1n",
            Rtrue => "rtrue",
            Rfalse => "rfalse",
            Print => "print",
            PrintRet => "print_ret",
            Nop => "nop",
            Restart => "restart",
            RetPopped => "ret_popped",
            Catch => "catch",
            Quit => "quit",
            NewLine => "new_line",
            Verify => "verify",
            Piracy => "piracy",
            CallVs => "call_vs",
            Storew => "storew",
            Storeb => "storeb",
            PutProp => "put_prop",
            Aread => "aread",
            PrintChar => "print_char",
            PrintNum => "print_num",
            Random => "random",
            Push => "push",
            Pull => "pull",
            SplitWindow => "split_window",
            SetWindow => "set_window",
            CallVs2 => "call_vs2",
            EraseWindow => "erase_window",
            EraseLine => "erase_line",
            SetCursor => "set_cursor",
            GetCursor => "get_cursor",
            SetTextStyle => "set_text_style",
            BufferMode => "buffer_mode",
            OutputStream => "output_stream",
            InputStream => "input_stream",
            SoundEffect => "sound_effect",
            ReadChar => "read_char",
            ScanTable => "scan_table",
            Not => "not",
            CallVn => "call_vn",
            CallVn2 => "call_vn2",
            Tokenise => "tokenise",
            EncodeText => "encode_text",
            CopyTable => "copy_table",
            PrintTable => "print_table",
            CheckArgCount => "check_arg_count",
            Save => "save",
            Restore => "restore",
            LogShift => "log_shift",
            ArtShift => "art_shift",
            SetFont => "set_font",
            SaveUndo => "save_undo",
            RestoreUndo => "restore_undo",
            PrintUnicode => "print_unicode",
            CheckUnicode => "check_unicode",
        }
    }
}
